//! The window host: a native window whose content is a Flutter view.
//!
//! ## Creation
//! 1) Size a controller to the client area; fail if it has no engine or view.
//! 2) Register plugins, adopt the view HWND as child content.
//! 3) Install the window channel, fit the child, show on first frame.
//! 4) Force a redraw in case the first frame already happened.
//!
//! ## Handled Messages
//! - **All**: first offered to the controller via `handle_top_level_window_proc`.
//! - **WM_SIZE** / **WM_SIZING**: one forced redraw per message, claimed or not.
//! - **WM_FONTCHANGE** (unclaimed): reload system fonts.
//! - **Unclaimed**: fall through to the base window.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::error::RunnerError;
use crate::project::DartProject;
use crate::view_controller::{ControllerFactory, ViewController};
use crate::window_channel::{self, TitleSink, WindowTitleBridge};
use crate::window_message::{
    ClientArea, Dispatch, RawHwnd, WindowMessage, WM_FONTCHANGE, WM_SIZE, WM_SIZING,
};

/// The base windowing abstraction the host extends.
pub trait WindowBase {
    fn handle(&self) -> Option<RawHwnd>;

    fn client_area(&self) -> ClientArea;

    /// Best effort; failures are ignored.
    fn disable_transitions(&mut self);

    /// Re-parents `child` into this window and fits it to the client area.
    fn set_child_content(&mut self, child: RawHwnd);

    fn move_child_content(&mut self, child: RawHwnd, area: ClientArea);

    /// A callback that reveals the window when invoked.
    fn deferred_show(&self) -> Box<dyn FnOnce()>;

    /// Where bridge title updates are written.
    fn title_sink(&self) -> Box<dyn TitleSink>;

    /// Base teardown, after the host released its own resources.
    fn on_destroy(&mut self);
}

pub struct FlutterWindow<B: WindowBase, F: ControllerFactory> {
    base: B,
    factory: F,
    project: DartProject,
    controller: Option<F::Controller>,
    title_bridge: Option<Rc<RefCell<WindowTitleBridge>>>,
}

impl<B: WindowBase, F: ControllerFactory> FlutterWindow<B, F> {
    pub fn new(base: B, factory: F, project: DartProject) -> Self {
        Self {
            base,
            factory,
            project,
            controller: None,
            title_bridge: None,
        }
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut B {
        &mut self.base
    }

    pub fn controller(&self) -> Option<&F::Controller> {
        self.controller.as_ref()
    }

    /// The last title set over the window channel, once the channel exists.
    pub fn current_title(&self) -> Option<String> {
        self.title_bridge
            .as_ref()
            .map(|bridge| bridge.borrow().current_title())
    }

    /// Called once the native window exists. Any error aborts window creation.
    pub fn on_create(&mut self) -> Result<(), RunnerError> {
        let frame = self.base.client_area();
        self.base.disable_transitions();

        info!(
            "[FlutterWindow] Creating view controller ({}×{})",
            frame.width(),
            frame.height()
        );
        let mut controller = self
            .factory
            .create(frame.width(), frame.height(), &self.project)?;

        if !controller.has_engine() {
            error!("[FlutterWindow] Controller has no engine");
            return Err(RunnerError::EngineUnavailable);
        }
        let Some(view) = controller.native_view() else {
            error!("[FlutterWindow] Controller has no view");
            return Err(RunnerError::ViewUnavailable);
        };

        match controller.register_plugins() {
            Ok(count) => info!("[FlutterWindow] {} plugin(s) registered", count),
            Err(e) => warn!("[FlutterWindow] {}", e),
        }
        self.base.set_child_content(view);

        let bridge = Rc::new(RefCell::new(WindowTitleBridge::new(self.base.title_sink())));
        controller.set_method_call_handler(window_channel::window_channel(bridge.clone()))?;
        self.title_bridge = Some(bridge);

        let area = self.base.client_area();
        self.base.move_child_content(view, area);

        controller.set_next_frame_callback(self.base.deferred_show());
        // The first frame may already be done; this makes sure one is pending.
        controller.force_redraw();

        self.controller = Some(controller);
        info!("[FlutterWindow] Created, view HWND = {:#x}", view);
        Ok(())
    }

    /// Releases the controller, then tears down the base window.
    pub fn on_destroy(&mut self) {
        if let Some(controller) = self.controller.take() {
            drop(controller);
            debug!("[FlutterWindow] View controller released");
        }
        self.base.on_destroy();
    }

    /// Runs the handler chain for one message.
    ///
    /// Every `WM_SIZE`/`WM_SIZING` forces exactly one redraw, even when the
    /// engine claims the message; the claimed result is still returned.
    pub fn message_handler(&mut self, message: &WindowMessage) -> Dispatch {
        let claimed = self
            .controller
            .as_mut()
            .and_then(|controller| controller.handle_top_level_window_proc(message));

        if let Some(controller) = self.controller.as_mut() {
            match message.message {
                WM_SIZE | WM_SIZING => controller.force_redraw(),
                WM_FONTCHANGE if claimed.is_none() => controller.reload_system_fonts(),
                _ => {}
            }
        }

        match claimed {
            Some(result) => Dispatch::Handled(result),
            None => Dispatch::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, EncodableValue, MethodCall};
    use crate::constants::WINDOW_CHANNEL;
    use crate::method_channel::MethodChannel;
    use crate::window_message::WM_DESTROY;

    const VIEW: RawHwnd = 0x2000;
    const HWND: RawHwnd = 0x1000;

    #[derive(Default)]
    struct Journal {
        events: Vec<String>,
        redraws: usize,
        font_reloads: usize,
        shown: bool,
        title: Option<Vec<u16>>,
        next_frame: Option<Box<dyn FnOnce()>>,
        channels: Vec<MethodChannel>,
    }

    type Shared = Rc<RefCell<Journal>>;

    struct FakeBase(Shared);

    struct FakeSink(Shared);

    impl TitleSink for FakeSink {
        fn set_title(&mut self, title: &[u16]) {
            self.0.borrow_mut().title = Some(title.to_vec());
        }
        fn invalidate(&mut self) {
            self.0.borrow_mut().events.push("invalidate".into());
        }
    }

    impl WindowBase for FakeBase {
        fn handle(&self) -> Option<RawHwnd> {
            Some(HWND)
        }
        fn client_area(&self) -> ClientArea {
            ClientArea::new(0, 0, 800, 600)
        }
        fn disable_transitions(&mut self) {
            self.0.borrow_mut().events.push("disable_transitions".into());
        }
        fn set_child_content(&mut self, child: RawHwnd) {
            self.0.borrow_mut().events.push(format!("child {:#x}", child));
        }
        fn move_child_content(&mut self, child: RawHwnd, area: ClientArea) {
            self.0
                .borrow_mut()
                .events
                .push(format!("move {:#x} {}x{}", child, area.width(), area.height()));
        }
        fn deferred_show(&self) -> Box<dyn FnOnce()> {
            let journal = self.0.clone();
            Box::new(move || journal.borrow_mut().shown = true)
        }
        fn title_sink(&self) -> Box<dyn TitleSink> {
            Box::new(FakeSink(self.0.clone()))
        }
        fn on_destroy(&mut self) {
            self.0.borrow_mut().events.push("base destroy".into());
        }
    }

    struct FakeController {
        journal: Shared,
        engine: bool,
        view: Option<RawHwnd>,
        /// Messages the fake engine claims, with their result.
        claims: Vec<(u32, isize)>,
    }

    impl Drop for FakeController {
        fn drop(&mut self) {
            self.journal.borrow_mut().events.push("controller dropped".into());
        }
    }

    impl ViewController for FakeController {
        fn has_engine(&self) -> bool {
            self.engine
        }
        fn native_view(&self) -> Option<RawHwnd> {
            self.view
        }
        fn register_plugins(&mut self) -> Result<usize, RunnerError> {
            self.journal.borrow_mut().events.push("plugins".into());
            Ok(2)
        }
        fn set_method_call_handler(&mut self, channel: MethodChannel) -> Result<(), RunnerError> {
            self.journal.borrow_mut().channels.push(channel);
            Ok(())
        }
        fn set_next_frame_callback(&mut self, callback: Box<dyn FnOnce()>) {
            self.journal.borrow_mut().next_frame = Some(callback);
        }
        fn force_redraw(&mut self) {
            self.journal.borrow_mut().redraws += 1;
        }
        fn reload_system_fonts(&mut self) {
            self.journal.borrow_mut().font_reloads += 1;
        }
        fn handle_top_level_window_proc(&mut self, message: &WindowMessage) -> Option<isize> {
            self.claims
                .iter()
                .find(|(m, _)| *m == message.message)
                .map(|(_, r)| *r)
        }
    }

    struct FakeFactory {
        journal: Shared,
        engine: bool,
        view: Option<RawHwnd>,
        claims: Vec<(u32, isize)>,
        fail: bool,
        requested: Option<(i32, i32)>,
    }

    impl ControllerFactory for FakeFactory {
        type Controller = FakeController;

        fn create(
            &mut self,
            width: i32,
            height: i32,
            _project: &DartProject,
        ) -> Result<FakeController, RunnerError> {
            self.requested = Some((width, height));
            if self.fail {
                return Err(RunnerError::ControllerCreationFailed("engine refused".into()));
            }
            Ok(FakeController {
                journal: self.journal.clone(),
                engine: self.engine,
                view: self.view,
                claims: self.claims.clone(),
            })
        }
    }

    fn window_with(
        configure: impl FnOnce(&mut FakeFactory),
    ) -> (FlutterWindow<FakeBase, FakeFactory>, Shared) {
        let journal: Shared = Rc::new(RefCell::new(Journal::default()));
        let mut factory = FakeFactory {
            journal: journal.clone(),
            engine: true,
            view: Some(VIEW),
            claims: Vec::new(),
            fail: false,
            requested: None,
        };
        configure(&mut factory);
        let window = FlutterWindow::new(
            FakeBase(journal.clone()),
            factory,
            DartProject::new("data"),
        );
        (window, journal)
    }

    fn created(
        configure: impl FnOnce(&mut FakeFactory),
    ) -> (FlutterWindow<FakeBase, FakeFactory>, Shared) {
        let (mut window, journal) = window_with(configure);
        window.on_create().unwrap();
        (window, journal)
    }

    fn message(msg: u32) -> WindowMessage {
        WindowMessage::new(HWND, msg, 0, 0)
    }

    #[test]
    fn create_wires_view_channel_and_first_frame() {
        let (window, journal) = created(|_| {});

        assert_eq!(window.factory.requested, Some((800, 600)));
        assert!(window.controller().is_some());
        let journal = journal.borrow();
        assert_eq!(
            journal.events,
            vec![
                "disable_transitions".to_string(),
                "plugins".to_string(),
                "child 0x2000".to_string(),
                "move 0x2000 800x600".to_string(),
            ]
        );
        assert_eq!(journal.channels.len(), 1);
        assert_eq!(journal.channels[0].name(), WINDOW_CHANNEL);
        assert_eq!(journal.redraws, 1);
        assert!(journal.next_frame.is_some());
        assert!(!journal.shown);
    }

    #[test]
    fn first_frame_shows_the_window() {
        let (_window, journal) = created(|_| {});
        let callback = journal.borrow_mut().next_frame.take().unwrap();
        callback();
        assert!(journal.borrow().shown);
    }

    #[test]
    fn create_fails_without_engine() {
        let (mut window, _) = window_with(|f| f.engine = false);
        assert!(matches!(window.on_create(), Err(RunnerError::EngineUnavailable)));
        assert!(window.controller().is_none());
    }

    #[test]
    fn create_fails_without_view() {
        let (mut window, journal) = window_with(|f| f.view = None);
        assert!(matches!(window.on_create(), Err(RunnerError::ViewUnavailable)));
        assert!(window.controller().is_none());
        assert!(journal.borrow().channels.is_empty());
    }

    #[test]
    fn controller_construction_error_propagates() {
        let (mut window, _) = window_with(|f| f.fail = true);
        assert!(matches!(
            window.on_create(),
            Err(RunnerError::ControllerCreationFailed(_))
        ));
    }

    #[test]
    fn resize_redraws_once_whether_claimed_or_not() {
        let (mut window, journal) = created(|f| f.claims = vec![(WM_SIZING, 1)]);
        let before = journal.borrow().redraws;

        assert_eq!(window.message_handler(&message(WM_SIZE)), Dispatch::Default);
        assert_eq!(journal.borrow().redraws, before + 1);

        assert_eq!(window.message_handler(&message(WM_SIZING)), Dispatch::Handled(1));
        assert_eq!(journal.borrow().redraws, before + 2);
    }

    #[test]
    fn claimed_message_returns_engine_result() {
        let (mut window, journal) = created(|f| f.claims = vec![(0x0100, 42)]);
        assert_eq!(window.message_handler(&message(0x0100)), Dispatch::Handled(42));
        assert_eq!(journal.borrow().redraws, 1);
    }

    #[test]
    fn font_change_reloads_fonts_unless_claimed() {
        let (mut window, journal) = created(|_| {});
        assert_eq!(window.message_handler(&message(WM_FONTCHANGE)), Dispatch::Default);
        assert_eq!(journal.borrow().font_reloads, 1);

        let (mut window, journal) = created(|f| f.claims = vec![(WM_FONTCHANGE, 0)]);
        assert_eq!(window.message_handler(&message(WM_FONTCHANGE)), Dispatch::Handled(0));
        assert_eq!(journal.borrow().font_reloads, 0);
    }

    #[test]
    fn without_controller_everything_falls_through() {
        let (mut window, journal) = window_with(|_| {});
        for msg in [WM_SIZE, WM_SIZING, WM_FONTCHANGE, WM_DESTROY] {
            assert_eq!(window.message_handler(&message(msg)), Dispatch::Default);
        }
        assert_eq!(journal.borrow().redraws, 0);
        assert_eq!(journal.borrow().font_reloads, 0);
    }

    #[test]
    fn destroy_releases_controller_before_base() {
        let (mut window, journal) = created(|_| {});
        journal.borrow_mut().events.clear();

        window.on_destroy();

        assert!(window.controller().is_none());
        assert_eq!(
            journal.borrow().events,
            vec!["controller dropped".to_string(), "base destroy".to_string()]
        );
        assert_eq!(window.message_handler(&message(WM_SIZE)), Dispatch::Default);
    }

    #[test]
    fn channel_updates_title_through_base() {
        let (window, journal) = created(|_| {});
        assert_eq!(window.current_title().as_deref(), Some("Karasu Launcher"));

        let mut channel = journal.borrow_mut().channels.pop().unwrap();
        let call = MethodCall::new(
            "updateWindowTitle",
            EncodableValue::Map(vec![("title".into(), "Hello".into())]),
        );
        let reply = channel.handle_message(&codec::encode_method_call(&call).unwrap());

        assert_eq!(reply, codec::encode_success_envelope(None).unwrap());
        assert_eq!(window.current_title().as_deref(), Some("Hello"));
        let journal = journal.borrow();
        assert_eq!(journal.title, Some(vec![72, 101, 108, 108, 111, 0]));
        assert_eq!(journal.events.last().map(String::as_str), Some("invalidate"));
    }
}
