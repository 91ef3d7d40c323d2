//! # Configuration
//!
//! Squirrel reads one TOML file through [`confique`]:
//!
//! ```toml
//! [backend]
//! type = "file"                    # "test" | "file" | "remote"
//! path = "./db/filestore.json"     # file backend, relative to this file
//! # address = "http://host:8080"   # remote backend
//! # timeout_secs = 10
//!
//! [control_layer]
//! ca = true
//! pva = false
//! ```
//!
//! ## Discovery
//!
//! [`find_config`] checks, in order:
//! 1. `$SQUIRREL_CFG`, used as-is.
//! 2. `$XDG_CONFIG_HOME` (or the current directory when unset).
//! 3. `~/.config`, via the `directories` crate.
//!
//! Each directory is probed for `.squirrel.toml`, then `squirrel.toml`.
//!
//! A missing `[backend]` section is not an error: [`crate::init::initialize`]
//! falls back to an empty in-memory backend and logs a warning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use confique::Config;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SquirrelError};

pub const CONFIG_ENV: &str = "SQUIRREL_CFG";
pub const CONFIG_NAMES: [&str; 2] = [".squirrel.toml", "squirrel.toml"];

/// Which backend to build, with its settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Volatile in-memory store.
    #[serde(alias = "memory")]
    Test,
    #[serde(alias = "filestore")]
    File { path: PathBuf },
    #[serde(alias = "mongo")]
    Remote {
        address: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

/// Configuration for squirrel, stored in `squirrel.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SquirrelConfig {
    pub backend: Option<BackendConfig>,

    /// Live-data shim name to enabled flag.
    pub control_layer: Option<BTreeMap<String, bool>>,
}

impl SquirrelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SquirrelError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Ok(SquirrelConfig::builder().file(path).load()?)
    }

    /// Names of the shims switched on, in name order.
    pub fn enabled_shims(&self) -> Vec<String> {
        self.control_layer
            .iter()
            .flatten()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Locate the config file from the process environment.
pub fn find_config() -> Result<PathBuf> {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let xdg = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().join(".config"));
    locate_config(explicit, &[Some(xdg), home])
}

/// Discovery over explicit inputs: `explicit` wins, then the first
/// directory holding one of [`CONFIG_NAMES`].
pub fn locate_config(explicit: Option<PathBuf>, dirs: &[Option<PathBuf>]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    dirs.iter()
        .flatten()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            SquirrelError::Config(format!(
                "no config found; set ${} or create one of {}",
                CONFIG_ENV,
                CONFIG_NAMES.join(", ")
            ))
        })
}

/// Resolve `path` against the directory `base`; `~` expands to home.
pub fn build_abs_path(base: &Path, path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
