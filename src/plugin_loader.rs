// src/plugin_loader.rs

use anyhow::{Context, Result};
use goblin::Object;
use libloading::{Library, Symbol};
use log::{debug, info, warn};
use std::{
    ffi::{CStr, CString},
    fs,
    path::{Path, PathBuf},
};

use crate::constants::FLUTTER_WINDOWS_DLL;
use crate::flutter_bindings::{FlutterDesktopPluginRegistrarRef, PluginRegisterFn};

const REG_SUFFIX: &str = "RegisterWithRegistrar";

/// A bundled plugin DLL and its `*RegisterWithRegistrar` exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLibrary {
    pub path: PathBuf,
    pub symbols: Vec<String>,
}

impl PluginLibrary {
    /// The registrar name: the file stem (`url_launcher_windows_plugin`).
    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}

fn is_dll(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dll"))
}

/// Registration exports in a PE image; empty for anything else.
pub fn registration_symbols(image: &[u8]) -> Vec<String> {
    match Object::parse(image) {
        Ok(Object::PE(pe)) => pe
            .exports
            .iter()
            .filter_map(|e| e.name)
            .filter(|n| n.ends_with(REG_SUFFIX))
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Scan the directory for all DLLs exporting `*RegisterWithRegistrar`.
pub fn discover_plugins(release_dir: &Path) -> Result<Vec<PluginLibrary>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(release_dir)
        .with_context(|| format!("reading directory {}", release_dir.display()))?
    {
        let dll = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("[Plugin Loader] Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let is_engine = dll
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(FLUTTER_WINDOWS_DLL));
        if !is_dll(&dll) || is_engine {
            continue;
        }
        let data = match fs::read(&dll) {
            Ok(data) => data,
            Err(e) => {
                warn!("[Plugin Loader] Skipping {}: {}", dll.display(), e);
                continue;
            }
        };
        let symbols = registration_symbols(&data);
        if !symbols.is_empty() {
            debug!("[Plugin Loader] {} exports {:?}", dll.display(), symbols);
            out.push(PluginLibrary { path: dll, symbols });
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

/// Load one DLL and invoke each `xxxRegisterWithRegistrar` symbol.
fn load_and_register(
    plugin: &PluginLibrary,
    registrar: FlutterDesktopPluginRegistrarRef,
) -> Result<()> {
    let lib = unsafe {
        Library::new(&plugin.path).with_context(|| format!("loading {}", plugin.path.display()))?
    };
    for sym in &plugin.symbols {
        let cname = CString::new(sym.as_str())?;
        let func: Symbol<PluginRegisterFn> = unsafe {
            lib.get(cname.as_bytes_with_nul())
                .with_context(|| format!("symbol {}", sym))?
        };
        unsafe { func(registrar) };
    }
    // keep the library alive for the life of the process
    std::mem::forget(lib);
    Ok(())
}

/// Discover every plugin DLL and register it against the registrar
/// `registrar_for` returns for its name. Returns the number of plugins registered.
pub fn load_and_register_plugins<F>(release_dir: &Path, registrar_for: F) -> Result<usize>
where
    F: FnMut(&CStr) -> FlutterDesktopPluginRegistrarRef,
{
    let plugins = discover_plugins(release_dir)
        .with_context(|| format!("discovering plugins in {}", release_dir.display()))?;
    Ok(register_plugins(&plugins, registrar_for))
}

/// Registers each plugin in turn. A plugin that fails is logged and skipped.
pub fn register_plugins<F>(plugins: &[PluginLibrary], mut registrar_for: F) -> usize
where
    F: FnMut(&CStr) -> FlutterDesktopPluginRegistrarRef,
{
    let mut registered = 0;
    for plugin in plugins {
        let result = CString::new(plugin.name())
            .context("plugin name contains NUL")
            .and_then(|c_name| load_and_register(plugin, registrar_for(&c_name)));
        match result {
            Ok(()) => {
                info!("[Plugin Loader] Registered {}", plugin.name());
                registered += 1;
            }
            Err(e) => warn!("[Plugin Loader] Failed to register {}: {:#}", plugin.name(), e),
        }
    }
    registered
}
