//! The Windows runner of Karasu Launcher: a native window hosting the
//! Flutter view.
//!
//! - Initializes COM (STA) for Flutter plugins and Win32 operations
//! - Creates the Flutter view controller sized to the window
//! - Loads and registers Flutter plugins found beside the executable
//! - Exposes the `com.karasu256.karasu_launcher/window` method channel
//! - Runs the standard message loop and cleans up on exit
//!
//! Everything except [`win32_window`] and [`run`] is platform independent.

pub mod codec;
pub mod config;
pub mod constants;
pub mod dynamic_flutter_windows_dll_loader;
pub mod error;
pub mod flutter_bindings;
pub mod flutter_controller;
pub mod flutter_window;
pub mod method_channel;
pub mod plugin_loader;
pub mod project;
pub mod view_controller;
#[cfg(windows)]
pub mod win32_window;
pub mod window_channel;
pub mod window_message;

use std::{path::PathBuf, sync::Once};

use env_logger::{Builder, Env};
use log::{error, LevelFilter};

use crate::config::RunnerConfig;

pub use error::RunnerError;

/// Program entry point.
///
/// 1. Load config, initialize logging and COM.
/// 2. Resolve the Dart project beside the executable.
/// 3. Create the Flutter window (shown on first frame).
/// 4. Run the message loop.
/// 5. Uninitialize COM and exit.
#[cfg(windows)]
pub fn run() -> anyhow::Result<()> {
    use anyhow::Context;
    use log::info;
    use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};

    use crate::{
        dynamic_flutter_windows_dll_loader::exe_directory,
        flutter_controller::DllControllerFactory, flutter_window::FlutterWindow,
        win32_window::Win32Window,
    };

    let (exe_dir, config) = load_startup_config(exe_directory)?;
    let config = config.with_command_line(std::env::args().skip(1));

    unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
        .ok()
        .context("COM init failed (STA)")?;
    info!("COM initialized (STA)");

    let result = (|| -> anyhow::Result<()> {
        let project = config.project(&exe_dir);
        project.validate()?;

        let factory = DllControllerFactory::new(&exe_dir)?;
        let window = FlutterWindow::new(
            Win32Window::new().with_quit_on_close(true),
            factory,
            project,
        );
        let window = win32_window::create(window, &config.title, config.origin, config.size)?;
        win32_window::run_message_loop();
        win32_window::close(window);
        Ok(())
    })();

    unsafe { CoUninitialize() };
    info!("Application exiting");
    result
}

/// Resolves the executable directory and loads the runner config beside it.
///
/// Logging is up before this returns on every path, with the config's filter
/// when there is one and the default otherwise.
pub fn load_startup_config<D>(resolve_exe_dir: D) -> anyhow::Result<(PathBuf, RunnerConfig)>
where
    D: FnOnce() -> anyhow::Result<PathBuf>,
{
    let exe_dir = match resolve_exe_dir() {
        Ok(dir) => dir,
        Err(e) => {
            init_logging(constants::DEFAULT_LOG_FILTER);
            return Err(e);
        }
    };
    let config = RunnerConfig::load_from(&exe_dir);
    init_logging(
        config
            .as_ref()
            .map(|c| c.log_filter.as_str())
            .unwrap_or(constants::DEFAULT_LOG_FILTER),
    );
    let config = config.inspect_err(|e| error!("Invalid runner config: {:#}", e))?;
    Ok((exe_dir, config))
}

// The runner may be started more than once from the same process (tests,
// embedding), and env_logger panics on a second init.
static LOGGER_INIT: Once = Once::new();

/// Initializes `env_logger` once. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    LOGGER_INIT.call_once(|| {
        let _ = Builder::from_env(Env::default().default_filter_or(default_filter))
            .filter_module("goblin", LevelFilter::Off)
            .try_init();
    });
}
