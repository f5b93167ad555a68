//! Error types shared by every skein crate.
//!
//! Framework-level errors (extraction, plugin loading, sieves) live in
//! `skein-framework`; configuration errors live in `skein-runtime`.

use thiserror::Error;

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors produced while parsing a raw IRC line into a [`Message`].
///
/// A parse error never terminates a session: the offending line is skipped.
///
/// [`Message`]: crate::Message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line was empty or whitespace only.
    #[error("empty line")]
    Empty,

    /// A prefix was present but nothing followed it.
    #[error("missing command: {line}")]
    MissingCommand {
        /// The offending line.
        line: String,
    },

    /// The command token is neither a verb nor a three digit numeric.
    #[error("invalid command `{command}`")]
    InvalidCommand {
        /// The rejected token.
        command: String,
    },
}

/// Result type for parsing.
pub type ParseResult<T> = Result<T, ParseError>;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while connecting or writing to a server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS resolution or TCP connect failed.
    #[error("connection to {addr} failed: {reason}")]
    ConnectFailed {
        /// `host:port` that was dialed.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// The host is not a valid TLS server name.
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// An encoding label is not known to the decoder.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The outgoing queue has no session draining it anymore.
    #[error("failed to queue line: {0}")]
    SendFailed(String),
}

impl TransportError {
    /// Creates a connect failure.
    pub fn connect(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
