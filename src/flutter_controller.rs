//! The real engine behind [`ViewController`]: a Flutter view controller
//! created through `flutter_windows.dll`.

use crate::{
    dynamic_flutter_windows_dll_loader::FlutterDll,
    error::RunnerError,
    flutter_bindings as b,
    method_channel::MethodChannel,
    plugin_loader,
    project::{to_wide_path, DartProject},
    view_controller::{ControllerFactory, ViewController},
    window_message::{RawHwnd, WindowMessage},
};
use log::{debug, error, info, warn};
use std::{
    cell::RefCell,
    ffi::{c_char, c_void, CString},
    path::{Path, PathBuf},
    ptr, slice,
    sync::Arc,
};

/// Creates [`FlutterViewController`]s from the DLL beside the executable.
pub struct DllControllerFactory {
    dll: Arc<FlutterDll>,
    plugin_dir: PathBuf,
}

impl DllControllerFactory {
    pub fn new(exe_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            dll: FlutterDll::get_for(Some(exe_dir))?,
            plugin_dir: exe_dir.to_path_buf(),
        })
    }
}

impl ControllerFactory for DllControllerFactory {
    type Controller = FlutterViewController;

    fn create(
        &mut self,
        width: i32,
        height: i32,
        project: &DartProject,
    ) -> Result<FlutterViewController, RunnerError> {
        let engine = create_engine(&self.dll, project)?;

        info!("[Flutter Controller] Creating view controller");
        // The view controller owns the engine from here on, even when creation fails.
        let controller = checked_controller(unsafe {
            (self.dll.FlutterDesktopViewControllerCreate)(width, height, engine)
        })?;
        info!("[Flutter Controller] View controller created");

        Ok(FlutterViewController {
            dll: self.dll.clone(),
            controller,
            plugin_dir: self.plugin_dir.clone(),
            channels: Vec::new(),
            next_frame: None,
        })
    }
}

fn checked_controller(
    controller: b::FlutterDesktopViewControllerRef,
) -> Result<b::FlutterDesktopViewControllerRef, RunnerError> {
    if controller.is_null() {
        error!("[Flutter Controller] View controller creation failed");
        return Err(RunnerError::ControllerCreationFailed(
            "FlutterDesktopViewControllerCreate returned null".into(),
        ));
    }
    Ok(controller)
}

/// Creates the engine for `project`. Ownership passes to the view controller.
fn create_engine(
    dll: &FlutterDll,
    project: &DartProject,
) -> Result<b::FlutterDesktopEngineRef, RunnerError> {
    let assets_w = to_wide_path(&project.assets_path());
    let icu_w = to_wide_path(&project.icu_data_path());
    let aot_w = to_wide_path(&project.aot_library_path());

    let args: Vec<CString> = project
        .dart_entrypoint_args()
        .iter()
        .filter_map(|arg| match CString::new(arg.as_str()) {
            Ok(c) => Some(c),
            Err(_) => {
                warn!("[Flutter Controller] Dropping argument with NUL: {:?}", arg);
                None
            }
        })
        .collect();
    let mut args_ptrs: Vec<*const c_char> = args.iter().map(|a| a.as_ptr()).collect();

    let props = b::FlutterDesktopEngineProperties {
        assets_path: assets_w.as_ptr(),
        icu_data_path: icu_w.as_ptr(),
        aot_library_path: aot_w.as_ptr(),
        dart_entrypoint: ptr::null(),
        dart_entrypoint_argc: args_ptrs.len() as i32,
        dart_entrypoint_argv: if args_ptrs.is_empty() {
            ptr::null_mut()
        } else {
            args_ptrs.as_mut_ptr()
        },
        gpu_preference: b::GPU_PREFERENCE_NO_PREFERENCE,
        ui_thread_policy: b::UI_THREAD_POLICY_DEFAULT,
    };

    info!("[Flutter Controller] Initializing Flutter engine");
    let engine = unsafe { (dll.FlutterDesktopEngineCreate)(&props) };
    if engine.is_null() {
        error!("[Flutter Controller] Engine creation failed");
        return Err(RunnerError::ControllerCreationFailed(
            "FlutterDesktopEngineCreate returned null".into(),
        ));
    }
    info!("[Flutter Controller] Engine created");
    Ok(engine)
}

/// A method channel installed on the engine messenger; `user_data` of the callback.
struct ChannelRegistration {
    dll: Arc<FlutterDll>,
    name: CString,
    channel: RefCell<MethodChannel>,
}

type NextFrameSlot = Option<Box<dyn FnOnce()>>;

pub struct FlutterViewController {
    dll: Arc<FlutterDll>,
    controller: b::FlutterDesktopViewControllerRef,
    plugin_dir: PathBuf,
    /// Boxed so the addresses handed to the engine stay put.
    channels: Vec<Box<ChannelRegistration>>,
    next_frame: Option<Box<NextFrameSlot>>,
}

impl FlutterViewController {
    fn engine(&self) -> b::FlutterDesktopEngineRef {
        unsafe { (self.dll.FlutterDesktopViewControllerGetEngine)(self.controller) }
    }

    fn messenger(&self) -> Option<b::FlutterDesktopMessengerRef> {
        let engine = self.engine();
        if engine.is_null() {
            return None;
        }
        let messenger = unsafe { (self.dll.FlutterDesktopEngineGetMessenger)(engine) };
        (!messenger.is_null()).then_some(messenger)
    }
}

impl ViewController for FlutterViewController {
    fn has_engine(&self) -> bool {
        !self.engine().is_null()
    }

    fn native_view(&self) -> Option<RawHwnd> {
        let view = unsafe { (self.dll.FlutterDesktopViewControllerGetView)(self.controller) };
        if view.is_null() {
            return None;
        }
        let hwnd = unsafe { (self.dll.FlutterDesktopViewGetHWND)(view) };
        (!hwnd.is_null()).then_some(hwnd as RawHwnd)
    }

    fn register_plugins(&mut self) -> Result<usize, RunnerError> {
        let engine = self.engine();
        let dll = self.dll.clone();
        plugin_loader::load_and_register_plugins(&self.plugin_dir, |name| unsafe {
            (dll.FlutterDesktopEngineGetPluginRegistrar)(engine, name.as_ptr())
        })
        .map_err(|e| RunnerError::PluginRegistration(format!("{:#}", e)))
    }

    fn set_method_call_handler(&mut self, channel: MethodChannel) -> Result<(), RunnerError> {
        let name = CString::new(channel.name())
            .map_err(|_| RunnerError::InvalidChannelName(channel.name().to_string()))?;
        let Some(messenger) = self.messenger() else {
            return Err(RunnerError::EngineUnavailable);
        };

        let registration = Box::new(ChannelRegistration {
            dll: self.dll.clone(),
            name,
            channel: RefCell::new(channel),
        });
        let user_data = &*registration as *const ChannelRegistration as *mut c_void;
        unsafe {
            (self.dll.FlutterDesktopMessengerSetCallback)(
                messenger,
                registration.name.as_ptr(),
                Some(on_channel_message),
                user_data,
            );
        }
        debug!("[Flutter Controller] Handler installed on {:?}", registration.name);
        self.channels.push(registration);
        Ok(())
    }

    fn set_next_frame_callback(&mut self, callback: Box<dyn FnOnce()>) {
        let engine = self.engine();
        if engine.is_null() {
            return;
        }
        let mut slot: Box<NextFrameSlot> = Box::new(Some(callback));
        let user_data = &mut *slot as *mut NextFrameSlot as *mut c_void;
        unsafe {
            (self.dll.FlutterDesktopEngineSetNextFrameCallback)(
                engine,
                Some(on_next_frame),
                user_data,
            );
        }
        self.next_frame = Some(slot);
    }

    fn force_redraw(&mut self) {
        unsafe { (self.dll.FlutterDesktopViewControllerForceRedraw)(self.controller) };
    }

    fn reload_system_fonts(&mut self) {
        let engine = self.engine();
        if !engine.is_null() {
            unsafe { (self.dll.FlutterDesktopEngineReloadSystemFonts)(engine) };
        }
    }

    fn handle_top_level_window_proc(&mut self, message: &WindowMessage) -> Option<isize> {
        let mut result: b::LRESULT = 0;
        let handled = unsafe {
            (self.dll.FlutterDesktopViewControllerHandleTopLevelWindowProc)(
                self.controller,
                message.hwnd as b::HWND,
                message.message,
                message.wparam,
                message.lparam,
                &mut result,
            )
        };
        handled.then_some(result)
    }
}

impl Drop for FlutterViewController {
    fn drop(&mut self) {
        if let Some(messenger) = self.messenger() {
            for registration in &self.channels {
                unsafe {
                    (self.dll.FlutterDesktopMessengerSetCallback)(
                        messenger,
                        registration.name.as_ptr(),
                        None,
                        ptr::null_mut(),
                    );
                }
            }
        }
        // Also destroys the engine.
        unsafe { (self.dll.FlutterDesktopViewControllerDestroy)(self.controller) };
        info!("[Flutter Controller] View controller destroyed");
    }
}

unsafe extern "C" fn on_channel_message(
    messenger: b::FlutterDesktopMessengerRef,
    message: *const b::FlutterDesktopMessage,
    user_data: *mut c_void,
) {
    let Some(registration) = (unsafe { (user_data as *const ChannelRegistration).as_ref() })
    else {
        error!("[Flutter Controller] Channel message with null user_data");
        return;
    };
    let Some(message) = (unsafe { message.as_ref() }) else {
        error!("[Flutter Controller] Null platform message");
        return;
    };

    let payload: &[u8] = if message.message.is_null() || message.message_size == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(message.message, message.message_size) }
    };

    let reply = match registration.channel.try_borrow_mut() {
        Ok(mut channel) => channel.handle_message(payload),
        Err(_) => {
            warn!(
                "[Flutter Controller] Re-entrant message on {:?} answered empty",
                registration.name
            );
            Vec::new()
        }
    };

    if !message.response_handle.is_null() {
        unsafe {
            (registration.dll.FlutterDesktopMessengerSendResponse)(
                messenger,
                message.response_handle,
                reply.as_ptr(),
                reply.len(),
            );
        }
    }
}

unsafe extern "C" fn on_next_frame(user_data: *mut c_void) {
    let slot = unsafe { (user_data as *mut NextFrameSlot).as_mut() };
    if let Some(callback) = slot.and_then(Option::take) {
        debug!("[Flutter Controller] First frame rendered");
        callback();
    }
}
