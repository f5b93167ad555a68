//! Runtime error types.

use skein_framework::{RegistryError, SieveError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that end the runtime or one of its connections.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A core plugin unit failed to load.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A connection's sieve table is invalid.
    #[error("invalid sieve configuration for connection {connection}: {source}")]
    Sieve {
        connection: String,
        #[source]
        source: SieveError,
    },

    /// The reconnect policy ran out of attempts.
    #[error("connection {connection} gave up after {attempts} failed attempts")]
    ReconnectExhausted { connection: String, attempts: u32 },

    /// The outgoing queue of a connection was lost with its writer task.
    #[error("connection {connection} lost its outgoing queue")]
    QueueLost { connection: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
