use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use skein::framework::{Store, StoreResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

type Tables = BTreeMap<String, BTreeMap<String, Value>>;

/// A [`Store`] persisted to a single JSON file.
///
/// Reads are served from memory. Every write rewrites the file through a
/// temporary sibling and a rename, so a crash never leaves a half-written
/// file behind.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<Tables>,
    flush: Mutex<()>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Tables::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), namespaces = data.len(), "Opened JSON store");

        Ok(Self {
            path,
            data: RwLock::new(data),
            flush: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> StoreResult<()> {
        let _guard = self.flush.lock().await;
        // Serialized under the flush lock so the last writer sees the newest state.
        let bytes = serde_json::to_vec_pretty(&*self.data.read())?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Store flushed");
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .and_then(|table| table.get(key))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> StoreResult<()> {
        self.data
            .write()
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        self.persist().await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<bool> {
        let existed = {
            let mut data = self.data.write();
            let existed = data
                .get_mut(namespace)
                .is_some_and(|table| table.remove(key).is_some());
            if data.get(namespace).is_some_and(BTreeMap::is_empty) {
                data.remove(namespace);
            }
            existed
        };
        if existed {
            self.persist().await?;
        }
        Ok(existed)
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore").field("path", &self.path).finish()
    }
}
