//! Skein Runtime - runs plugin hooks against live IRC connections.
//!
//! This crate provides:
//! - Layered configuration (`SkeinConfig`, `ConfigLoader`)
//! - Logging setup from configuration (`LoggingBuilder`)
//! - The per-network session loop with reconnect (`Connection`)
//! - The built-in `core` plugin unit
//! - Runtime orchestration (`SkeinRuntime`)
//!
//! ```ignore
//! use skein_runtime::SkeinRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = SkeinRuntime::builder()
//!         .config_file("skein.toml")
//!         .plugin(ECHO)
//!         .build()?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Connections
//!
//! Each `[[connections]]` entry gets its own task, dispatch engine and sieve
//! chain. All of them share the plugin registry and the store. A dropped
//! session reconnects right away; failed connects back off per the
//! connection's `reconnect` table.

pub mod builtin;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod runtime;

pub use builtin::CORE;
pub use config::{ConfigError, ConfigLoader, ConfigResult, ConnectionConfig, SkeinConfig};
pub use connection::{Censor, Connection};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, SkeinRuntime};
