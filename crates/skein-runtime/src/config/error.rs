//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded or was rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension names a format that is not compiled in.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// Figment could not extract the configuration.
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// A required value is empty.
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Two connections share a name, compared case-insensitively.
    #[error("Duplicate connection name: {0}")]
    DuplicateConnection(String),

    /// A connection's port is 0.
    #[error("Connection {connection} has an invalid port: {port}")]
    InvalidPort { connection: String, port: u16 },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(Box::new(e))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
