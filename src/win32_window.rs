//! The Win32 base window: class registration, creation, the window
//! procedure, child-content embedding and the message loop.
//!
//! Stripping `WS_POPUP` and adding `WS_CHILD` on the Flutter view lets the
//! parent window's non-client (titlebar) hit-testing work so the header
//! drags normally.
//!
//! ## Message routing
//! - **WM_NCCREATE**: store the `RunnerWindow` pointer, attach the HWND.
//! - **Everything else**: first the host's handler chain
//!   ([`FlutterWindow::message_handler`]), then, if unclaimed:
//!   - **WM_DESTROY**: host teardown (controller first), `WM_QUIT` if quit-on-close.
//!   - **WM_SIZE**: fit the child content to the client area.
//!   - **WM_ACTIVATE**: forward keyboard focus to the child content.
//!   - **WM_DPICHANGED**: move to the suggested bounds.
//!   - **WM_NCDESTROY**: forget the pointer and the HWND.
//!   - **All others**: `DefWindowProcW`.

use crate::{
    config::{Origin, Size},
    constants,
    error::RunnerError,
    flutter_controller::DllControllerFactory,
    flutter_window::{FlutterWindow, WindowBase},
    window_channel::TitleSink,
    window_message::{ClientArea, Dispatch, RawHwnd, WindowMessage},
};
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use std::ffi::c_void;
use windows::{
    core::{HSTRING, PCWSTR},
    Win32::{
        Foundation::{GetLastError, BOOL, HWND, LPARAM, LRESULT, RECT, TRUE, WPARAM},
        Graphics::{
            Dwm::{DwmSetWindowAttribute, DWMWA_TRANSITIONS_FORCEDISABLED},
            Gdi::InvalidateRect,
        },
        System::LibraryLoader::GetModuleHandleW,
        UI::{
            Input::KeyboardAndMouse::SetFocus,
            WindowsAndMessaging::{
                CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
                GetClientRect, GetMessageW, GetWindowLongPtrW, LoadCursorW, MoveWindow,
                PostQuitMessage, RegisterClassW, SetParent, SetWindowLongPtrW, SetWindowPos,
                SetWindowTextW, ShowWindow, TranslateMessage, CREATESTRUCTW, CS_HREDRAW,
                CS_VREDRAW, GWLP_USERDATA, GWL_STYLE, IDC_ARROW, MSG, SWP_NOACTIVATE,
                SWP_NOZORDER, SW_SHOWNORMAL, WINDOW_EX_STYLE, WM_ACTIVATE, WM_DESTROY,
                WM_DPICHANGED, WM_NCCREATE, WM_NCDESTROY, WM_SIZE, WNDCLASSW, WS_CHILD,
                WS_CLIPCHILDREN, WS_OVERLAPPEDWINDOW, WS_POPUP, WS_VISIBLE,
            },
        },
    },
};

/// The window host as the runner uses it.
pub type RunnerWindow = FlutterWindow<Win32Window, DllControllerFactory>;

fn to_hwnd(raw: RawHwnd) -> HWND {
    HWND(raw as *mut c_void)
}

fn client_rect(hwnd: HWND) -> ClientArea {
    let mut rc = RECT::default();
    match unsafe { GetClientRect(hwnd, &mut rc) } {
        Ok(()) => ClientArea::new(rc.left, rc.top, rc.right, rc.bottom),
        Err(e) => {
            warn!("[Win32Window] GetClientRect failed: {:?}", e);
            ClientArea::default()
        }
    }
}

/// The native top-level window.
#[derive(Debug, Default)]
pub struct Win32Window {
    hwnd: Option<HWND>,
    child_content: Option<HWND>,
    quit_on_close: bool,
}

impl Win32Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `WM_QUIT` when the window is destroyed.
    pub fn with_quit_on_close(mut self, quit_on_close: bool) -> Self {
        self.quit_on_close = quit_on_close;
        self
    }

    fn attach(&mut self, hwnd: HWND) {
        self.hwnd = Some(hwnd);
    }

    /// Default handling for messages the host did not claim.
    fn message_handler(&mut self, hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        unsafe {
            match msg {
                WM_SIZE => {
                    if let Some(child) = self.child_content {
                        let rc = client_rect(hwnd);
                        debug!(
                            "[Win32Window] Resizing child {:?} to {}×{}",
                            child,
                            rc.width(),
                            rc.height()
                        );
                        let _ = MoveWindow(child, rc.left, rc.top, rc.width(), rc.height(), true);
                    }
                    LRESULT(0)
                }

                WM_ACTIVATE => {
                    if let Some(child) = self.child_content {
                        let _ = SetFocus(Some(child));
                    }
                    LRESULT(0)
                }

                WM_DPICHANGED => {
                    // lParam is a *const RECT of new bounds
                    if let Some(r) = (lparam.0 as *const RECT).as_ref() {
                        let _ = SetWindowPos(
                            hwnd,
                            None,
                            r.left,
                            r.top,
                            r.right - r.left,
                            r.bottom - r.top,
                            SWP_NOZORDER | SWP_NOACTIVATE,
                        );
                    }
                    LRESULT(0)
                }

                WM_NCDESTROY => {
                    SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                    self.hwnd = None;
                    self.child_content = None;
                    DefWindowProcW(hwnd, msg, wparam, lparam)
                }

                _ => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }
    }
}

impl WindowBase for Win32Window {
    fn handle(&self) -> Option<RawHwnd> {
        self.hwnd.map(|h| h.0 as RawHwnd)
    }

    fn client_area(&self) -> ClientArea {
        self.hwnd.map(client_rect).unwrap_or_default()
    }

    fn disable_transitions(&mut self) {
        let Some(hwnd) = self.hwnd else { return };
        let value: BOOL = TRUE;
        let result = unsafe {
            DwmSetWindowAttribute(
                hwnd,
                DWMWA_TRANSITIONS_FORCEDISABLED,
                &value as *const BOOL as *const c_void,
                std::mem::size_of::<BOOL>() as u32,
            )
        };
        if let Err(e) = result {
            debug!("[Win32Window] Transitions not disabled: {:?}", e);
        }
    }

    fn set_child_content(&mut self, child: RawHwnd) {
        let Some(parent) = self.hwnd else {
            warn!("[Win32Window] set_child_content before the window exists");
            return;
        };
        let child = to_hwnd(child);
        info!("[Win32Window] Embedding Flutter HWND {:?} into {:?}", child, parent);
        self.child_content = Some(child);

        unsafe {
            // Strip WS_POPUP → add WS_CHILD & WS_VISIBLE
            let old = GetWindowLongPtrW(child, GWL_STYLE);
            let new = (old & !(WS_POPUP.0 as isize)) | WS_CHILD.0 as isize | WS_VISIBLE.0 as isize;
            SetWindowLongPtrW(child, GWL_STYLE, new);
            debug!("[Win32Window] Child style {:#x} → {:#x}", old, new);

            if let Err(e) = SetParent(child, Some(parent)) {
                warn!("[Win32Window] SetParent error: {:?}", e);
            }
            let rc = client_rect(parent);
            let _ = MoveWindow(child, rc.left, rc.top, rc.width(), rc.height(), true);
            let _ = SetFocus(Some(child));
        }
    }

    fn move_child_content(&mut self, child: RawHwnd, area: ClientArea) {
        let _ = unsafe {
            MoveWindow(
                to_hwnd(child),
                area.left,
                area.top,
                area.width(),
                area.height(),
                true,
            )
        };
    }

    fn deferred_show(&self) -> Box<dyn FnOnce()> {
        let hwnd = self.hwnd;
        Box::new(move || {
            if let Some(hwnd) = hwnd {
                info!("[Win32Window] First frame ready, showing window");
                let _ = unsafe { ShowWindow(hwnd, SW_SHOWNORMAL) };
            }
        })
    }

    fn title_sink(&self) -> Box<dyn TitleSink> {
        Box::new(Win32TitleSink { hwnd: self.hwnd })
    }

    fn on_destroy(&mut self) {
        if self.quit_on_close {
            unsafe { PostQuitMessage(0) };
        }
    }
}

struct Win32TitleSink {
    hwnd: Option<HWND>,
}

impl TitleSink for Win32TitleSink {
    fn set_title(&mut self, title: &[u16]) {
        let Some(hwnd) = self.hwnd else { return };
        if let Err(e) = unsafe { SetWindowTextW(hwnd, PCWSTR(title.as_ptr())) } {
            warn!("[Win32Window] SetWindowTextW failed: {:?}", e);
        }
    }

    fn invalidate(&mut self) {
        if let Some(hwnd) = self.hwnd {
            let _ = unsafe { InvalidateRect(Some(hwnd), None, true) };
        }
    }
}

//---------------------------------------------------------------------------
// Window procedure
//---------------------------------------------------------------------------

/// # Safety
/// - Must be registered via `WNDCLASSW::lpfnWndProc`.
/// - Assumes `lpCreateParams` in `WM_NCCREATE` is a valid `*mut RunnerWindow`
///   that outlives the HWND.
pub unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        if msg == WM_NCCREATE {
            if let Some(cs) = (lparam.0 as *const CREATESTRUCTW).as_ref() {
                let window = cs.lpCreateParams as *mut RunnerWindow;
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, window as isize);
                if let Some(window) = window.as_mut() {
                    window.base_mut().attach(hwnd);
                }
            } else {
                warn!("[WndProc] CREATESTRUCTW was null");
            }
            return DefWindowProcW(hwnd, msg, wparam, lparam);
        }

        let Some(window) = (GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut RunnerWindow).as_mut()
        else {
            return DefWindowProcW(hwnd, msg, wparam, lparam);
        };

        let message = WindowMessage::new(hwnd.0 as RawHwnd, msg, wparam.0, lparam.0);
        match window.message_handler(&message) {
            Dispatch::Handled(result) => LRESULT(result),
            Dispatch::Default if msg == WM_DESTROY => {
                info!("[WndProc] WM_DESTROY");
                window.on_destroy();
                LRESULT(0)
            }
            Dispatch::Default => window.base_mut().message_handler(hwnd, msg, wparam, lparam),
        }
    }
}

//---------------------------------------------------------------------------
// Class registration / creation / message loop
//---------------------------------------------------------------------------

static WINDOW_CLASS: OnceCell<u16> = OnceCell::new();

/// Registers our window class (once).
fn register_window_class() -> Result<(), RunnerError> {
    WINDOW_CLASS.get_or_try_init(|| unsafe {
        let hinst = GetModuleHandleW(None)
            .map_err(|e| RunnerError::WindowCreationFailed(format!("GetModuleHandleW: {}", e)))?;
        let wc = WNDCLASSW {
            hInstance: hinst.into(),
            lpszClassName: constants::WINDOW_CLASS_NAME,
            lpfnWndProc: Some(wnd_proc),
            style: CS_HREDRAW | CS_VREDRAW,
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            ..Default::default()
        };
        let atom = RegisterClassW(&wc);
        if atom == 0 {
            return Err(RunnerError::WindowCreationFailed(format!(
                "RegisterClassW failed: {:?}",
                GetLastError()
            )));
        }
        info!("[Win32Window] Window class registered");
        Ok(atom)
    })?;
    Ok(())
}

/// Creates the native window (hidden until the first frame) and runs the
/// host's creation. On failure the window is destroyed again.
pub fn create(
    window: RunnerWindow,
    title: &str,
    origin: Origin,
    size: Size,
) -> Result<Box<RunnerWindow>, RunnerError> {
    register_window_class()?;

    let mut window = Box::new(window);
    let window_ptr: *mut RunnerWindow = &mut *window;

    info!(
        "[Win32Window] Creating main window '{}' at ({}, {}) {}×{}",
        title, origin.x, origin.y, size.width, size.height
    );
    let hwnd = unsafe {
        let hinst = GetModuleHandleW(None)
            .map_err(|e| RunnerError::WindowCreationFailed(format!("GetModuleHandleW: {}", e)))?;
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            constants::WINDOW_CLASS_NAME,
            &HSTRING::from(title),
            WS_OVERLAPPEDWINDOW | WS_CLIPCHILDREN,
            origin.x,
            origin.y,
            size.width,
            size.height,
            None,
            None,
            Some(hinst.into()),
            Some(window_ptr as *const c_void),
        )
    }
    .map_err(|e| {
        error!("[Win32Window] CreateWindowExW failed: {:?}", e);
        RunnerError::WindowCreationFailed(e.to_string())
    })?;
    info!("[Win32Window] Main window created: {:?}", hwnd);

    if let Err(e) = unsafe { (*window_ptr).on_create() } {
        error!("[Win32Window] Window creation aborted: {}", e);
        unsafe {
            let _ = DestroyWindow(hwnd);
        }
        return Err(e);
    }
    Ok(window)
}

/// Destroys the window if it is still alive, without routing through the host.
pub fn close(window: Box<RunnerWindow>) {
    if let Some(raw) = window.base().handle() {
        let hwnd = to_hwnd(raw);
        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            let _ = DestroyWindow(hwnd);
        }
    }
    drop(window);
}

/// Runs the Win32 message loop until `WM_QUIT`.
pub fn run_message_loop() {
    info!("[Win32Window] Entering message loop");
    let mut msg = MSG::default();
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    info!("[Win32Window] Exited message loop");
}
