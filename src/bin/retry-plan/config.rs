use std::path::{Path, PathBuf};

use retry_op::{RetryConfig, RetryError};

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("retry-plan").join("config.toml"))
}

/// Loads the override file, else the default file when present, else defaults.
pub fn load_config(path_override: Option<&Path>) -> Result<RetryConfig, RetryError> {
    if let Some(path) = path_override {
        return RetryConfig::load(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => RetryConfig::load(path),
        _ => Ok(RetryConfig::default()),
    }
}
