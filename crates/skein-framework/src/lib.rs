//! # Skein Framework
//!
//! Hooks, plugins and dispatch for the skein IRC bot framework.
//!
//! This layer provides:
//! - Hook declarations (`command`, `event`, `regex`) bound to Axum-style handlers
//! - Extractors that hand handlers exactly the context they ask for
//! - The [`PluginRegistry`] with stamp-based reload and atomic snapshots
//! - The [`DispatchEngine`] that matches messages and schedules hooks
//! - Sieves, per-hook workers and a namespaced key-value [`Store`]
//! - Clap-based argument parsing (with the `command` feature)

pub mod context;
pub mod dispatch;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod hook;
pub mod plugin;
pub mod registry;
pub mod sieve;
pub mod store;
pub mod worker;

#[cfg(feature = "command")]
pub mod args;

pub use context::{Captures, HookContext, HookInput};
pub use dispatch::{DispatchEngine, DispatchReport};
pub use error::{
    ExtractError, ExtractResult, LoadError, RegistryError, RegistryResult, SieveError, StoreError,
    StoreResult,
};
pub use extractor::FromContext;
pub use handler::{BoxedHookService, FromCtxFn, HandlerResponse, HandlerService};
pub use hook::{Hook, HookDef, HookInfo, HookKind, command, event, regex};
pub use plugin::{
    HandlerCatalog, ManifestSource, PluginConfig, PluginDescriptor, PluginMetadata, PluginSource,
    StaticSource,
};
pub use registry::{PluginRegistry, RegistrySnapshot, ScanReport};
pub use sieve::{SharedSieve, Sieve, SieveConfig, builtin_sieves, sieve_fn};
pub use store::{Db, MemoryStore, SharedStore, Store};
pub use worker::Worker;

#[cfg(feature = "command")]
pub use args::{Args, shell_split};
