//! # Skein
//!
//! A plugin-driven IRC bot framework for Rust.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   lines   ┌────────────┐  Message  ┌────────────────┐    ┌──────────────────┐
//! │ Transport  │──────────▶│ Connection │──────────▶│ DispatchEngine │───▶│ sieves ─▶ hooks  │
//! │ (TCP/TLS)  │◀──────────│  (session) │◀─ queue ──│                │    │ (worker / task)  │
//! └────────────┘           └────────────┘           └───────┬────────┘    └──────────────────┘
//!                                                           │ snapshot
//!                                                   ┌───────▼────────┐
//!                                                   │ PluginRegistry │◀── StaticSource / ManifestSource
//!                                                   └────────────────┘
//! ```
//!
//! - **Transport**: line framing, decoding fallbacks, read timeout, TLS
//! - **Connection**: handshake, PING, nick and channel tracking, reconnect
//! - **Registry**: plugin units with stamp-based reload and atomic snapshots
//! - **Hooks**: commands, events and regexes bound to Axum-style handlers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skein::prelude::*;
//!
//! async fn echo(Input(text): Input) -> String {
//!     text
//! }
//!
//! pub static ECHO: PluginDescriptor = define_plugin! {
//!     name: "echo",
//!     hooks: [command("echo").doc("<text> -- says <text> back").handler(echo)],
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = SkeinRuntime::builder().plugin(ECHO).build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `command`: clap-backed [`Args`](prelude::Args) extractor (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use skein_core as core;
pub use skein_framework as framework;
pub use skein_runtime as runtime;
pub use skein_transport as transport;

/// Commonly used types for writing plugins and binaries.
///
/// ```rust,ignore
/// use skein::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use skein_runtime::{RuntimeBuilder, SkeinConfig, SkeinRuntime};

    // Plugin units and hooks
    pub use skein_framework::{
        HandlerCatalog, HookInfo, PluginConfig, PluginDescriptor, command, define_plugin, event,
        regex,
    };

    // Extractors
    pub use skein_framework::extractor::{
        Action, Chan, FromContext, Input, Match, Nick, Notice, Params, Reply, Say, Trigger,
    };
    pub use skein_framework::{Db, HookContext};

    #[cfg(feature = "command")]
    pub use skein_framework::Args;

    // Sieves and storage
    pub use skein_framework::{Sieve, SieveError, Store, StoreResult, sieve_fn};

    // Connection
    pub use skein_core::{ConnectionHandle, Message, TransportResult};
}
