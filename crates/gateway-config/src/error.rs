//! Configuration error types.

use std::path::PathBuf;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading a file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File being parsed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Unknown file extension.
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// An environment override could not be applied.
    #[error("Invalid value for environment variable {var}: {message}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Reason
        message: String,
    },

    /// Key material could not be resolved.
    #[error("Invalid key material: {0}")]
    KeyMaterial(String),

    /// The file watcher failed.
    #[error("Configuration watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a key material error.
    pub fn key_material(msg: impl Into<String>) -> Self {
        Self::KeyMaterial(msg.into())
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
