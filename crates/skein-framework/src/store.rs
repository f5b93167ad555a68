//! Key-value storage shared by plugins.
//!
//! A [`Store`] keeps JSON values grouped by namespace. Handlers never see the
//! store directly; they take a [`Db`] extractor that scopes every namespace
//! to the connection the hook fired on, so two networks never share rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreResult;

// =============================================================================
// Store trait
// =============================================================================

/// Storage backend.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Value>>;

    async fn set(&self, namespace: &str, key: &str, value: Value) -> StoreResult<()>;

    /// Removes a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<bool>;

    /// All keys of a namespace in ascending order.
    async fn keys(&self, namespace: &str) -> StoreResult<Vec<String>>;
}

/// Type-erased store shared across connections.
pub type SharedStore = Arc<dyn Store>;

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
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
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<bool> {
        let mut data = self.data.write();
        let Some(table) = data.get_mut(namespace) else {
            return Ok(false);
        };
        let existed = table.remove(key).is_some();
        if table.is_empty() {
            data.remove(namespace);
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

// =============================================================================
// Db handle
// =============================================================================

/// Connection-scoped view of the store, handed to handlers.
///
/// ```rust,ignore
/// async fn seen(db: Db, nick: Nick) -> StoreResult<String> {
///     db.set("seen", &nick, &"just now").await?;
///     Ok("noted".into())
/// }
/// ```
#[derive(Clone)]
pub struct Db {
    store: SharedStore,
    scope: String,
}

impl Db {
    pub fn new(store: SharedStore, scope: impl Into<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
        }
    }

    /// The connection name every table is scoped to.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn namespace(&self, table: &str) -> String {
        format!("{}/{}", self.scope, table)
    }

    pub async fn get<T: DeserializeOwned>(&self, table: &str, key: &str) -> StoreResult<Option<T>> {
        match self.store.get(&self.namespace(table), key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        table: &str,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(&self.namespace(table), key, value).await
    }

    pub async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        self.store.delete(&self.namespace(table), key).await
    }

    pub async fn keys(&self, table: &str) -> StoreResult<Vec<String>> {
        self.store.keys(&self.namespace(table)).await
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("scope", &self.scope).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Seen {
        chan: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryStore::new();
        store.set("t", "b", Value::from(2)).await.unwrap();
        store.set("t", "a", Value::from(1)).await.unwrap();

        assert_eq!(store.get("t", "a").await.unwrap(), Some(Value::from(1)));
        assert_eq!(store.keys("t").await.unwrap(), vec!["a", "b"]);
        assert!(store.delete("t", "a").await.unwrap());
        assert!(!store.delete("t", "a").await.unwrap());
        assert!(store.get("t", "a").await.unwrap().is_none());
        assert!(store.keys("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_db_scopes_by_connection() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let libera = Db::new(store.clone(), "libera");
        let oftc = Db::new(store.clone(), "oftc");

        let seen = Seen {
            chan: "#rust".into(),
            count: 3,
        };
        libera.set("seen", "alice", &seen).await.unwrap();

        assert_eq!(libera.get::<Seen>("seen", "alice").await.unwrap(), Some(seen));
        assert!(oftc.get::<Seen>("seen", "alice").await.unwrap().is_none());
        assert_eq!(store.keys("libera/seen").await.unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_db_type_mismatch_is_an_error() {
        let db = Db::new(Arc::new(MemoryStore::new()), "net");
        tokio_test::block_on(async {
            db.set("t", "k", "text").await.unwrap();
            assert!(db.get::<u32>("t", "k").await.is_err());
        });
    }
}
