//! Platform window messages as seen by the window host.

/// A window handle as an integer, the way the engine's C API passes it around.
pub type RawHwnd = isize;

// Win32 message identifiers the window host reacts to.
pub const WM_DESTROY: u32 = 0x0002;
pub const WM_SIZE: u32 = 0x0005;
pub const WM_FONTCHANGE: u32 = 0x001D;
pub const WM_SIZING: u32 = 0x0214;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub hwnd: RawHwnd,
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl WindowMessage {
    pub fn new(hwnd: RawHwnd, message: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            hwnd,
            message,
            wparam,
            lparam,
        }
    }
}

/// Outcome of the window host's handler chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Claimed; return this `LRESULT` to the system.
    Handled(isize),
    /// Fall through to the base window's default handling.
    Default,
}

/// The drawable interior of a window, in client coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientArea {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ClientArea {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}
