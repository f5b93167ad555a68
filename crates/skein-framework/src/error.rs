//! Error types for the skein framework.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during context extraction.
///
/// A failed extraction skips the handler without logging an error.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The context does not carry the requested value.
    #[error("{what} is not available for this hook")]
    Missing {
        /// Name of the missing value.
        what: &'static str,
    },

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors produced while loading a plugin unit.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("unit `{unit}` does not exist")]
    UnknownUnit { unit: String },

    #[error("unit `{unit}` refers to unknown handler `{handler}`")]
    UnknownHandler { unit: String, handler: String },

    #[error("hook `{hook}` has an invalid name `{name}`")]
    InvalidName { hook: String, name: String },

    #[error("hook `{hook}` has an invalid pattern: {reason}")]
    InvalidRegex { hook: String, reason: String },

    #[error("command `{command}` is already registered by unit `{owner}`")]
    DuplicateCommand { command: String, owner: String },

    #[error("hook `{hook}` needs a running tokio runtime: {reason}")]
    Runtime { hook: String, reason: String },
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that abort a registry scan.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A core unit failed to load. Fatal at startup.
    #[error("core unit `{unit}` failed to load: {source}")]
    CoreUnit {
        unit: String,
        #[source]
        source: LoadError,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A sieve failed while inspecting an invocation. The invocation is dropped.
#[derive(Debug, Clone, Error)]
#[error("sieve `{sieve}` failed: {reason}")]
pub struct SieveError {
    pub sieve: String,
    pub reason: String,
}

impl SieveError {
    pub fn new(sieve: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            sieve: sieve.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a [`Store`](crate::store::Store) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
