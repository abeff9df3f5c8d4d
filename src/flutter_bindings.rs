//! Declarations for the subset of `flutter_windows.h` the runner uses.
//! The functions themselves are resolved at run time, see
//! [`crate::dynamic_flutter_windows_dll_loader`].
#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

macro_rules! opaque_ref {
    ($name:ident, $ref:ident) => {
        #[repr(C)]
        pub struct $name {
            _private: [u8; 0],
        }
        pub type $ref = *mut $name;
    };
}

opaque_ref!(FlutterDesktopEngine, FlutterDesktopEngineRef);
opaque_ref!(FlutterDesktopViewController, FlutterDesktopViewControllerRef);
opaque_ref!(FlutterDesktopView, FlutterDesktopViewRef);
opaque_ref!(FlutterDesktopPluginRegistrar, FlutterDesktopPluginRegistrarRef);
opaque_ref!(FlutterDesktopMessenger, FlutterDesktopMessengerRef);
opaque_ref!(FlutterDesktopMessageResponseHandle, FlutterDesktopMessageResponseHandleRef);

pub type HWND = *mut c_void;
pub type WPARAM = usize;
pub type LPARAM = isize;
pub type LRESULT = isize;
pub type UINT = u32;

/// `FlutterDesktopGpuPreference::NoPreference`
pub const GPU_PREFERENCE_NO_PREFERENCE: c_int = 0;
/// `FlutterDesktopUIThreadPolicy::Default`
pub const UI_THREAD_POLICY_DEFAULT: c_int = 0;

#[repr(C)]
pub struct FlutterDesktopEngineProperties {
    pub assets_path: *const u16,
    pub icu_data_path: *const u16,
    pub aot_library_path: *const u16,
    pub dart_entrypoint: *const c_char,
    pub dart_entrypoint_argc: c_int,
    pub dart_entrypoint_argv: *mut *const c_char,
    pub gpu_preference: c_int,
    pub ui_thread_policy: c_int,
}

#[repr(C)]
pub struct FlutterDesktopMessage {
    pub struct_size: usize,
    pub channel: *const c_char,
    pub message: *const u8,
    pub message_size: usize,
    pub response_handle: FlutterDesktopMessageResponseHandleRef,
}

pub type FlutterDesktopMessageCallback = Option<
    unsafe extern "C" fn(
        messenger: FlutterDesktopMessengerRef,
        message: *const FlutterDesktopMessage,
        user_data: *mut c_void,
    ),
>;

pub type VoidCallback = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// Signature of a plugin's `*RegisterWithRegistrar` export.
pub type PluginRegisterFn = unsafe extern "C" fn(FlutterDesktopPluginRegistrarRef);
