#[cfg(windows)]
use windows::core::{w, PCWSTR};

/// The Win32 window class name used to register and create the main window.
#[cfg(windows)]
pub const WINDOW_CLASS_NAME: PCWSTR = w!("FLUTTER_RUNNER_WIN32_WINDOW");

/// Method channel the Dart side uses to talk to the window host.
pub const WINDOW_CHANNEL: &str = "com.karasu256.karasu_launcher/window";

/// Method on [`WINDOW_CHANNEL`] that replaces the title bar text.
pub const UPDATE_WINDOW_TITLE_METHOD: &str = "updateWindowTitle";

/// Argument key carrying the new title.
pub const TITLE_ARGUMENT: &str = "title";

/// Title remembered by the bridge before Dart sets one.
pub const INITIAL_WINDOW_TITLE: &str = "Karasu Launcher";

/// Title the native window is created with.
pub const DEFAULT_WINDOW_TITLE: &str = "karasu_launcher";

/// Default top-left corner (in pixels) of the main application window.
pub const DEFAULT_WINDOW_X: i32 = 10;
pub const DEFAULT_WINDOW_Y: i32 = 10;

/// Default width (in pixels) for the main application window.
pub const DEFAULT_WINDOW_WIDTH: i32 = 1280;

/// Default height (in pixels) for the main application window.
pub const DEFAULT_WINDOW_HEIGHT: i32 = 720;

/// Optional JSON file beside the executable overriding [`crate::config::RunnerConfig`].
pub const CONFIG_FILE_NAME: &str = "runner_config.json";

/// Directory (relative to the executable) holding the Flutter build output.
pub const DATA_DIR_NAME: &str = "data";

/// `env_logger` filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// The engine library shipped next to the runner.
pub const FLUTTER_WINDOWS_DLL: &str = "flutter_windows.dll";
