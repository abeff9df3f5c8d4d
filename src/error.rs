//! Error types surfaced by the window host and its collaborators.

use std::path::PathBuf;

#[derive(Debug)]
pub enum RunnerError {
    /// The controller was built but reports no engine.
    EngineUnavailable,
    /// The controller was built but reports no view (or the view has no HWND).
    ViewUnavailable,
    ControllerCreationFailed(String),
    WindowCreationFailed(String),
    /// A required file of the Flutter build output is missing.
    MissingAsset(PathBuf),
    InvalidChannelName(String),
    PluginRegistration(String),
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::EngineUnavailable => {
                write!(f, "Flutter view controller has no engine.")
            }
            RunnerError::ViewUnavailable => {
                write!(f, "Flutter view controller has no view.")
            }
            RunnerError::ControllerCreationFailed(s) => {
                write!(f, "Flutter view controller creation failed: {}", s)
            }
            RunnerError::WindowCreationFailed(s) => {
                write!(f, "Native window creation failed: {}", s)
            }
            RunnerError::MissingAsset(path) => {
                write!(f, "Missing Flutter asset at `{}`", path.display())
            }
            RunnerError::InvalidChannelName(name) => {
                write!(f, "Invalid method channel name {:?}", name)
            }
            RunnerError::PluginRegistration(s) => {
                write!(f, "Plugin registration failed: {}", s)
            }
        }
    }
}

impl std::error::Error for RunnerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            RunnerError::EngineUnavailable.to_string(),
            "Flutter view controller has no engine."
        );
        assert_eq!(
            RunnerError::MissingAsset(PathBuf::from("data/icudtl.dat")).to_string(),
            "Missing Flutter asset at `data/icudtl.dat`"
        );
        assert_eq!(
            RunnerError::PluginRegistration("boom".into()).to_string(),
            "Plugin registration failed: boom"
        );
    }
}
