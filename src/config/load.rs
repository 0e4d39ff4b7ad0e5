use std::fs;
use std::path::Path;

use crate::error::RetryError;

use super::retry::RetryConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, RetryError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(RetryError::ConfigParse(format!(
                "unsupported config format: {}",
                path.display()
            ))),
        }
    }
}

impl RetryConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, RetryError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, RetryError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(contents: &str) -> Result<Self, RetryError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RetryError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = fs::read_to_string(path)?;
        log::debug!("loading retry config from {}", path.display());
        match format {
            ConfigFormat::Toml => Self::from_toml_str(&contents),
            ConfigFormat::Yaml => Self::from_yaml_str(&contents),
            ConfigFormat::Json => Self::from_json_str(&contents),
        }
    }
}
