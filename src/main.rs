// Remove this for Console in Debug - Keep in Release
#![cfg_attr(all(target_os = "windows", not(debug_assertions)), windows_subsystem = "windows")]

use std::process::ExitCode;

#[cfg(windows)]
fn main() -> ExitCode {
    match karasu_launcher_runner::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(windows))]
fn main() -> ExitCode {
    karasu_launcher_runner::init_logging(karasu_launcher_runner::constants::DEFAULT_LOG_FILTER);
    log::error!("karasu_launcher hosts a Win32 window and only runs on Windows");
    ExitCode::FAILURE
}
