use crate::constants::FLUTTER_WINDOWS_DLL;
use crate::flutter_bindings as b;
use anyhow::{anyhow, Context, Result};
use libloading::{Library, Symbol};
use log::info;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    ffi::c_char,
    path::{Path, PathBuf},
    sync::Arc,
};

/// The engine entry points, resolved from `flutter_windows.dll`.
#[allow(non_snake_case)]
#[derive(Debug)]
pub struct FlutterDll {
    _lib: &'static Library,

    pub FlutterDesktopEngineCreate: Symbol<
        'static,
        unsafe extern "C" fn(*const b::FlutterDesktopEngineProperties) -> b::FlutterDesktopEngineRef,
    >,
    pub FlutterDesktopEngineDestroy:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopEngineRef) -> bool>,
    pub FlutterDesktopEngineGetPluginRegistrar: Symbol<
        'static,
        unsafe extern "C" fn(
            b::FlutterDesktopEngineRef,
            *const c_char,
        ) -> b::FlutterDesktopPluginRegistrarRef,
    >,
    pub FlutterDesktopEngineGetMessenger: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopEngineRef) -> b::FlutterDesktopMessengerRef,
    >,
    pub FlutterDesktopEngineReloadSystemFonts:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopEngineRef)>,
    pub FlutterDesktopEngineSetNextFrameCallback: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopEngineRef, b::VoidCallback, *mut std::ffi::c_void),
    >,
    pub FlutterDesktopViewControllerCreate: Symbol<
        'static,
        unsafe extern "C" fn(
            i32,
            i32,
            b::FlutterDesktopEngineRef,
        ) -> b::FlutterDesktopViewControllerRef,
    >,
    pub FlutterDesktopViewControllerDestroy:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopViewControllerRef)>,
    pub FlutterDesktopViewControllerGetEngine: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopViewControllerRef) -> b::FlutterDesktopEngineRef,
    >,
    pub FlutterDesktopViewControllerGetView: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopViewControllerRef) -> b::FlutterDesktopViewRef,
    >,
    pub FlutterDesktopViewControllerForceRedraw:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopViewControllerRef)>,
    pub FlutterDesktopViewControllerHandleTopLevelWindowProc: Symbol<
        'static,
        unsafe extern "C" fn(
            b::FlutterDesktopViewControllerRef,
            b::HWND,
            b::UINT,
            b::WPARAM,
            b::LPARAM,
            *mut b::LRESULT,
        ) -> bool,
    >,
    pub FlutterDesktopViewGetHWND:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopViewRef) -> b::HWND>,
    pub FlutterDesktopMessengerSetCallback: Symbol<
        'static,
        unsafe extern "C" fn(
            b::FlutterDesktopMessengerRef,
            *const c_char,
            b::FlutterDesktopMessageCallback,
            *mut std::ffi::c_void,
        ),
    >,
    pub FlutterDesktopMessengerSendResponse: Symbol<
        'static,
        unsafe extern "C" fn(
            b::FlutterDesktopMessengerRef,
            b::FlutterDesktopMessageResponseHandleRef,
            *const u8,
            usize,
        ),
    >,
}

static DLL_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<FlutterDll>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

macro_rules! resolve {
    ($lib:expr, $name:ident) => {
        $lib.get(concat!(stringify!($name), "\0").as_bytes())
            .context(concat!("Missing symbol: ", stringify!($name)))?
    };
}

impl FlutterDll {
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let dll_dir = match dir {
            Some(d) => d.to_path_buf(),
            None => exe_directory()?,
        };

        let dll_path = dll_dir.join(FLUTTER_WINDOWS_DLL);
        let lib = unsafe { Library::new(&dll_path) }
            .with_context(|| format!("Failed to load {}", dll_path.display()))?;
        info!("[Flutter DLL] Loaded {}", dll_path.display());

        // The engine must outlive every window; never unload it.
        let lib_static: &'static Library = Box::leak(Box::new(lib));

        unsafe {
            Ok(FlutterDll {
                _lib: lib_static,
                FlutterDesktopEngineCreate: resolve!(lib_static, FlutterDesktopEngineCreate),
                FlutterDesktopEngineDestroy: resolve!(lib_static, FlutterDesktopEngineDestroy),
                FlutterDesktopEngineGetPluginRegistrar: resolve!(
                    lib_static,
                    FlutterDesktopEngineGetPluginRegistrar
                ),
                FlutterDesktopEngineGetMessenger: resolve!(
                    lib_static,
                    FlutterDesktopEngineGetMessenger
                ),
                FlutterDesktopEngineReloadSystemFonts: resolve!(
                    lib_static,
                    FlutterDesktopEngineReloadSystemFonts
                ),
                FlutterDesktopEngineSetNextFrameCallback: resolve!(
                    lib_static,
                    FlutterDesktopEngineSetNextFrameCallback
                ),
                FlutterDesktopViewControllerCreate: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerCreate
                ),
                FlutterDesktopViewControllerDestroy: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerDestroy
                ),
                FlutterDesktopViewControllerGetEngine: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerGetEngine
                ),
                FlutterDesktopViewControllerGetView: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerGetView
                ),
                FlutterDesktopViewControllerForceRedraw: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerForceRedraw
                ),
                FlutterDesktopViewControllerHandleTopLevelWindowProc: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerHandleTopLevelWindowProc
                ),
                FlutterDesktopViewGetHWND: resolve!(lib_static, FlutterDesktopViewGetHWND),
                FlutterDesktopMessengerSetCallback: resolve!(
                    lib_static,
                    FlutterDesktopMessengerSetCallback
                ),
                FlutterDesktopMessengerSendResponse: resolve!(
                    lib_static,
                    FlutterDesktopMessengerSendResponse
                ),
            })
        }
    }

    /// Loads the DLL from `dir` (default: beside the executable) once per directory.
    pub fn get_for(dir: Option<&Path>) -> Result<Arc<Self>> {
        let key = match dir {
            Some(d) => d.to_path_buf(),
            None => exe_directory()?,
        };

        let mut cache = DLL_CACHE.lock();
        if let Some(existing) = cache.get(&key) {
            return Ok(existing.clone());
        }

        let dll = Arc::new(FlutterDll::load(Some(&key))?);
        cache.insert(key, dll.clone());
        Ok(dll)
    }
}

/// The directory containing the running executable.
pub fn exe_directory() -> Result<PathBuf> {
    std::env::current_exe()
        .context("Failed to get current exe path")?
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Exe has no parent directory"))
}
