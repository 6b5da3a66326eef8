//! Engine configuration.
//!
//! Loaded from `<home>/config.toml`. A missing file means defaults; a few
//! settings can be overridden from the environment.

use crate::core::error::TesseraError;
use crate::core::store::Mode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "TESSERA_HOME";
pub const MODE_ENV: &str = "TESSERA_MODE";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mode used when a request names none and nothing is applied yet.
    pub default_mode: Mode,
    /// Maximum applied-store history records kept per workspace.
    pub history_limit: usize,
    /// Repository-relative directory that holds the component catalog.
    pub component_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_mode: Mode::Symlink,
            history_limit: 50,
            component_dir: ".tessera".to_string(),
        }
    }
}

impl Config {
    /// Apply `TESSERA_MODE` when set.
    pub fn with_env_overrides(mut self) -> Result<Self, TesseraError> {
        if let Ok(mode) = std::env::var(MODE_ENV) {
            self.default_mode = mode.parse()?;
        }
        Ok(self)
    }
}

/// Load `<home>/config.toml`; no file means defaults.
pub fn load_config(home: &Path) -> Result<Config, TesseraError> {
    let config_path = home.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&config_path).map_err(TesseraError::IoError)?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| TesseraError::ConfigError(format!("{}: {}", config_path.display(), e)))?;
    if config.history_limit == 0 {
        return Err(TesseraError::ConfigError(
            "history_limit must be at least 1".to_string(),
        ));
    }
    Ok(config)
}

/// Explicit path, else `$TESSERA_HOME`, else `$HOME/.tessera`.
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf, TesseraError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    let user_home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .ok_or_else(|| {
            TesseraError::ConfigError(format!("neither {} nor HOME is set", HOME_ENV))
        })?;
    Ok(PathBuf::from(user_home).join(".tessera"))
}
