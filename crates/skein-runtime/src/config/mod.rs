//! Configuration for the skein runtime.
//!
//! Loading is layered with figment (defaults, profile file, main file,
//! `SKEIN_*` environment variables, programmatic merges); see [`loader`].
//! [`validate_config`] runs after loading and any failure is fatal.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ConnectionConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, NickServConfig,
    PluginsConfig, ReconnectConfig, SkeinConfig, SpanEventConfig,
};
pub use validation::validate_config;
