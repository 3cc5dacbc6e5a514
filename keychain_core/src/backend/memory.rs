//! In-memory storage backend
//!
//! Nothing survives the process. Useful for tests and for callers that only
//! need an ephemeral keychain.

use super::{BackendResult, SecureStorage, WriteMode, entry_key};
use crate::error::BackendError;
use crate::item::Item;
use crate::secret::Password;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

struct Entry {
    item: Item,
    secret: Option<Password>,
}

type Scope = BTreeMap<String, Entry>;

/// Volatile storage keyed by scope, then identifier
#[derive(Default)]
pub struct MemoryStorage {
    scopes: RwLock<HashMap<String, Scope>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items held in a scope
    pub async fn len(&self, scope: &str) -> usize {
        self.scopes.read().await.get(scope).map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self, scope: &str) -> bool {
        self.len(scope).await == 0
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn put(&self, scope: &str, item: &Item, mode: WriteMode) -> BackendResult<()> {
        let mut scopes = self.scopes.write().await;
        let entries = scopes.entry(scope.to_string()).or_default();

        match mode {
            WriteMode::Create => {
                if entries.contains_key(item.identifier()) {
                    return Err(BackendError::already_exists(entry_key(
                        scope,
                        item.identifier(),
                    )));
                }
                entries.insert(
                    item.identifier().to_string(),
                    Entry {
                        item: item.clone(),
                        secret: None,
                    },
                );
                Ok(())
            }
            WriteMode::Replace => {
                let entry = entries
                    .get_mut(item.identifier())
                    .ok_or_else(|| BackendError::not_found(entry_key(scope, item.identifier())))?;
                entry.item = item.clone();
                Ok(())
            }
        }
    }

    async fn get(&self, scope: &str, identifier: &str) -> BackendResult<Item> {
        self.scopes
            .read()
            .await
            .get(scope)
            .and_then(|entries| entries.get(identifier))
            .map(|entry| entry.item.clone())
            .ok_or_else(|| BackendError::not_found(entry_key(scope, identifier)))
    }

    async fn delete(&self, scope: &str, identifier: &str) -> BackendResult<()> {
        let mut scopes = self.scopes.write().await;
        let removed = scopes
            .get_mut(scope)
            .and_then(|entries| entries.remove(identifier));

        if removed.is_none() {
            return Err(BackendError::not_found(entry_key(scope, identifier)));
        }

        if scopes.get(scope).is_some_and(BTreeMap::is_empty) {
            scopes.remove(scope);
        }
        Ok(())
    }

    async fn list(&self, scope: &str) -> BackendResult<Vec<Item>> {
        Ok(self
            .scopes
            .read()
            .await
            .get(scope)
            .map(|entries| entries.values().map(|entry| entry.item.clone()).collect())
            .unwrap_or_default())
    }

    async fn put_secret(
        &self,
        scope: &str,
        identifier: &str,
        secret: Option<&Password>,
    ) -> BackendResult<()> {
        let mut scopes = self.scopes.write().await;
        let entry = scopes
            .get_mut(scope)
            .and_then(|entries| entries.get_mut(identifier))
            .ok_or_else(|| BackendError::not_found(entry_key(scope, identifier)))?;

        entry.secret = secret.cloned();
        Ok(())
    }

    async fn get_secret(&self, scope: &str, identifier: &str) -> BackendResult<Option<Password>> {
        self.scopes
            .read()
            .await
            .get(scope)
            .and_then(|entries| entries.get(identifier))
            .map(|entry| entry.secret.clone())
            .ok_or_else(|| BackendError::not_found(entry_key(scope, identifier)))
    }

    async fn clear(&self, scope: &str) -> BackendResult<()> {
        self.scopes.write().await.remove(scope);
        Ok(())
    }

    fn name(&self) -> &str {
        "Memory Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let storage = MemoryStorage::new();
        let item = Item::visible("mail");

        storage.put("svc", &item, WriteMode::Create).await.unwrap();
        let result = storage.put("svc", &item, WriteMode::Create).await;
        assert!(matches!(result, Err(BackendError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_replace_requires_existing_entry() {
        let storage = MemoryStorage::new();
        let result = storage
            .put("svc", &Item::visible("mail"), WriteMode::Replace)
            .await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replace_keeps_secret() {
        let storage = MemoryStorage::new();
        storage
            .put("svc", &Item::visible("mail"), WriteMode::Create)
            .await
            .unwrap();
        storage
            .put_secret("svc", "mail", Some(&Password::new("pw")))
            .await
            .unwrap();

        let replacement = Item::visible("mail").with_option("host", "example.org");
        storage
            .put("svc", &replacement, WriteMode::Replace)
            .await
            .unwrap();

        assert_eq!(storage.get("svc", "mail").await.unwrap(), replacement);
        let secret = storage.get_secret("svc", "mail").await.unwrap();
        assert_eq!(secret, Some(Password::new("pw")));
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let storage = MemoryStorage::new();
        storage
            .put("one", &Item::visible("shared"), WriteMode::Create)
            .await
            .unwrap();

        assert!(matches!(
            storage.get("two", "shared").await,
            Err(BackendError::NotFound(_))
        ));
        storage
            .put("two", &Item::visible("shared"), WriteMode::Create)
            .await
            .unwrap();

        storage.clear("one").await.unwrap();
        assert!(storage.is_empty("one").await);
        assert_eq!(storage.len("two").await, 1);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_identifier() {
        let storage = MemoryStorage::new();
        for id in ["zeta", "alpha", "mid"] {
            storage
                .put("svc", &Item::visible(id), WriteMode::Create)
                .await
                .unwrap();
        }

        let ids: Vec<String> = storage
            .list("svc")
            .await
            .unwrap()
            .iter()
            .map(|item| item.identifier().to_string())
            .collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_secret_of_missing_item() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.get_secret("svc", "nope").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            storage.put_secret("svc", "nope", None).await,
            Err(BackendError::NotFound(_))
        ));
    }
}
