//! The Flutter build output the engine runs: asset, ICU data and AOT library
//! paths under a data directory, plus the Dart entrypoint arguments.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::RunnerError;

#[derive(Debug, Clone, PartialEq)]
pub struct DartProject {
    data_dir: PathBuf,
    dart_entrypoint_args: Vec<String>,
}

impl DartProject {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            dart_entrypoint_args: Vec::new(),
        }
    }

    pub fn with_entrypoint_args(mut self, args: Vec<String>) -> Self {
        self.dart_entrypoint_args = args;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `<data>/flutter_assets`
    pub fn assets_path(&self) -> PathBuf {
        self.data_dir.join("flutter_assets")
    }

    /// `<data>/icudtl.dat`
    pub fn icu_data_path(&self) -> PathBuf {
        self.data_dir.join("icudtl.dat")
    }

    /// `<data>/app.so`
    pub fn aot_library_path(&self) -> PathBuf {
        self.data_dir.join("app.so")
    }

    pub fn dart_entrypoint_args(&self) -> &[String] {
        &self.dart_entrypoint_args
    }

    /// Checks the required files exist.
    ///
    /// `app.so` is optional: debug (JIT) builds do not ship it and the engine
    /// falls back to the kernel blob in `flutter_assets`.
    pub fn validate(&self) -> Result<(), RunnerError> {
        info!("[DartProject] Data directory: {:?}", self.data_dir);

        let assets = self.assets_path();
        if !assets.is_dir() {
            return Err(RunnerError::MissingAsset(assets));
        }
        let icu = self.icu_data_path();
        if !icu.is_file() {
            return Err(RunnerError::MissingAsset(icu));
        }

        let aot = self.aot_library_path();
        debug!(
            "[DartProject] Validated paths: assets=`{}`, icu=`{}`, aot=`{}` ({})",
            assets.display(),
            icu.display(),
            aot.display(),
            if aot.is_file() { "present" } else { "absent, JIT" },
        );
        Ok(())
    }
}

/// Build a null-terminated UTF-16 path for Win32 APIs.
#[cfg(windows)]
pub fn to_wide_path(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;

    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(not(windows))]
pub fn to_wide_path(path: &Path) -> Vec<u16> {
    path.to_string_lossy()
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scaffold(with_aot: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("flutter_assets")).unwrap();
        fs::write(dir.path().join("icudtl.dat"), b"icu").unwrap();
        if with_aot {
            fs::write(dir.path().join("app.so"), b"aot").unwrap();
        }
        dir
    }

    #[test]
    fn paths_are_under_data_dir() {
        let project = DartProject::new("C:/app/data");
        assert_eq!(project.assets_path(), Path::new("C:/app/data/flutter_assets"));
        assert_eq!(project.icu_data_path(), Path::new("C:/app/data/icudtl.dat"));
        assert_eq!(project.aot_library_path(), Path::new("C:/app/data/app.so"));
    }

    #[test]
    fn complete_release_layout_validates() {
        let dir = scaffold(true);
        assert!(DartProject::new(dir.path()).validate().is_ok());
    }

    #[test]
    fn jit_layout_without_aot_validates() {
        let dir = scaffold(false);
        assert!(DartProject::new(dir.path()).validate().is_ok());
    }

    #[test]
    fn missing_icu_is_reported() {
        let dir = scaffold(true);
        fs::remove_file(dir.path().join("icudtl.dat")).unwrap();
        match DartProject::new(dir.path()).validate() {
            Err(RunnerError::MissingAsset(path)) => assert!(path.ends_with("icudtl.dat")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_assets_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        match DartProject::new(dir.path()).validate() {
            Err(RunnerError::MissingAsset(path)) => assert!(path.ends_with("flutter_assets")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wide_path_is_terminated() {
        let wide = to_wide_path(Path::new("data"));
        assert_eq!(wide, vec![100, 97, 116, 97, 0]);
    }
}
