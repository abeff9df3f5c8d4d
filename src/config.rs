//! Runner configuration: built-in defaults, optionally overridden by
//! `runner_config.json` beside the executable, plus command-line arguments
//! forwarded to the Dart entrypoint.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::constants;
use crate::project::DartProject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Origin {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Title the window is created with (Dart may change it later).
    pub title: String,
    pub origin: Origin,
    pub size: Size,
    /// Defaults to `<exe dir>/data`. Relative paths are resolved against the exe dir.
    pub data_dir: Option<PathBuf>,
    pub dart_entrypoint_args: Vec<String>,
    /// `env_logger` filter; `RUST_LOG` still wins.
    pub log_filter: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            title: constants::DEFAULT_WINDOW_TITLE.to_string(),
            origin: Origin {
                x: constants::DEFAULT_WINDOW_X,
                y: constants::DEFAULT_WINDOW_Y,
            },
            size: Size {
                width: constants::DEFAULT_WINDOW_WIDTH,
                height: constants::DEFAULT_WINDOW_HEIGHT,
            },
            data_dir: None,
            dart_entrypoint_args: Vec::new(),
            log_filter: constants::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing runner config")
    }

    /// Reads `runner_config.json` from `dir`; a missing file yields the defaults.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(constants::CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Appends command-line arguments (program name already stripped).
    pub fn with_command_line<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.dart_entrypoint_args.extend(args);
        self
    }

    pub fn data_dir(&self, exe_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) => exe_dir.join(dir),
            None => exe_dir.join(constants::DATA_DIR_NAME),
        }
    }

    pub fn project(&self, exe_dir: &Path) -> DartProject {
        let project = DartProject::new(self.data_dir(exe_dir))
            .with_entrypoint_args(self.dart_entrypoint_args.clone());
        debug!("[Config] {:?}", project);
        project
    }
}
