use thiserror::Error;

/// Error types raised while configuring retry schedules and operations.
///
/// Running out of attempts is not represented here: exhaustion is reported by
/// `retry()` returning `false`, and the caller's own error comes back through
/// `main_error()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Configuration values that cannot produce a schedule
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// Configuration document could not be decoded
    #[error("Config parse error: {0}")]
    ConfigParse(String),
    /// Configuration file could not be read
    #[error("Config IO error: {0}")]
    Io(String),
}

impl From<toml::de::Error> for RetryError {
    fn from(err: toml::de::Error) -> Self {
        RetryError::ConfigParse(err.to_string())
    }
}

impl From<serde_yaml::Error> for RetryError {
    fn from(err: serde_yaml::Error) -> Self {
        RetryError::ConfigParse(err.to_string())
    }
}

impl From<serde_json::Error> for RetryError {
    fn from(err: serde_json::Error) -> Self {
        RetryError::ConfigParse(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<std::io::Error> for RetryError {
    fn from(err: std::io::Error) -> Self {
        RetryError::Io(err.to_string())
    }
}
