//! The engine seam: what the window host needs from a Flutter view controller.

use crate::error::RunnerError;
use crate::method_channel::MethodChannel;
use crate::project::DartProject;
use crate::window_message::{RawHwnd, WindowMessage};

pub trait ViewController {
    /// Whether construction produced a usable engine.
    fn has_engine(&self) -> bool;

    /// The HWND the engine renders into, if the view exists.
    fn native_view(&self) -> Option<RawHwnd>;

    /// Registers the bundled plugins with the engine. Returns how many were registered.
    fn register_plugins(&mut self) -> Result<usize, RunnerError>;

    /// Installs `channel` on the engine's messenger under its name.
    fn set_method_call_handler(&mut self, channel: MethodChannel) -> Result<(), RunnerError>;

    /// Runs `callback` once, after the next frame is rendered.
    fn set_next_frame_callback(&mut self, callback: Box<dyn FnOnce()>);

    fn force_redraw(&mut self);

    fn reload_system_fonts(&mut self);

    /// Gives the engine (and plugins) first refusal on a top-level window message.
    fn handle_top_level_window_proc(&mut self, message: &WindowMessage) -> Option<isize>;
}

/// Builds a controller sized to the window's client area.
pub trait ControllerFactory {
    type Controller: ViewController;

    fn create(
        &mut self,
        width: i32,
        height: i32,
        project: &DartProject,
    ) -> Result<Self::Controller, RunnerError>;
}
