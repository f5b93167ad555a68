//! Plugin units and where they come from.
//!
//! A plugin unit is a named group of hooks that is loaded, reloaded and
//! unloaded as a whole. Units come from [`PluginSource`]s:
//!
//! - [`StaticSource`] — compiled-in [`PluginDescriptor`]s made with
//!   [`define_plugin!`](crate::define_plugin). They load once.
//! - [`ManifestSource`] — TOML manifests in a directory, binding triggers to
//!   handlers in a [`HandlerCatalog`]. They reload when the file changes.
//!
//! # Quick start
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
//!     hooks: [command("echo").handler(echo)],
//! };
//! ```
//!
//! # Configuration
//!
//! Settings under `plugins.settings.<unit>` are attached to every invocation
//! of the unit's hooks. Handlers opt in with a [`PluginConfig<T>`] parameter.

mod descriptor;
mod extractor;
mod macros;
mod manifest;
mod source;

pub use descriptor::{PluginDescriptor, PluginMetadata};
pub use extractor::PluginConfig;
pub use manifest::{HandlerCatalog, ManifestSource};
pub use source::{PluginSource, StaticSource, Stamp, UnitStamp};
