//! File-backed storage for skein.
//!
//! [`JsonFileStore`] keeps every namespace in one pretty-printed JSON file
//! and rewrites it after each change. It is meant for small bots where a
//! database would be overkill.
//!
//! ```toml
//! [plugins.settings.storage]
//! path = "./bot_data/skein.json"
//! ```
//!
//! ```rust,ignore
//! let storage: StorageConfig = config.plugins.settings.get("storage")...;
//! let runtime = SkeinRuntime::builder()
//!     .store(JsonFileStore::open(&storage.path).await?)
//!     .build()?;
//! ```

mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use store::JsonFileStore;

/// Settings read from `plugins.settings.storage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The JSON file. Parent directories are created on open.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bot_data/skein.json"),
        }
    }
}
