//! Service-scoped credential store
//!
//! A [`Keychain`] manages the items and passwords of a single service name on
//! top of an injected [`SecureStorage`] backend. Every operation issues one
//! backend call, translates its failure into [`KeychainError`], and on
//! success notifies the registered listeners before returning.

use crate::backend::{SecureStorage, WriteMode};
use crate::error::{KeychainError, Result};
use crate::events::{KeychainEvent, KeychainListener, ListenerId, ListenerSet};
use crate::item::Item;
use crate::secret::Password;
use std::fmt;
use std::sync::Arc;

/// Credential store bound to one service name
pub struct Keychain {
    service_name: String,
    storage: Arc<dyn SecureStorage>,
    listeners: ListenerSet,
}

impl Keychain {
    /// Create a keychain for `service_name` on top of `storage`
    ///
    /// Fails with [`KeychainError::InvalidServiceName`] if the name is blank.
    pub fn new(service_name: impl Into<String>, storage: Arc<dyn SecureStorage>) -> Result<Self> {
        let service_name = service_name.into();
        if service_name.trim().is_empty() {
            return Err(KeychainError::InvalidServiceName);
        }

        log::debug!("Opened keychain '{service_name}' on {}", storage.name());

        Ok(Self {
            service_name,
            storage,
            listeners: ListenerSet::default(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// All items of this service, invisible ones included, ordered by identifier
    ///
    /// Use [`Keychain::visible_items`] for the filtered listing.
    pub async fn items(&self) -> Result<Vec<Item>> {
        self.storage
            .list(&self.service_name)
            .await
            .map_err(KeychainError::Backend)
    }

    /// Items whose `invisible` flag is not set
    pub async fn visible_items(&self) -> Result<Vec<Item>> {
        let mut items = self.items().await?;
        items.retain(|item| !item.invisible());
        Ok(items)
    }

    /// Look up a single item
    pub async fn item(&self, identifier: &str) -> Result<Item> {
        self.storage
            .get(&self.service_name, identifier)
            .await
            .map_err(|e| KeychainError::from_backend(identifier, e))
    }

    /// Check whether an item exists
    pub async fn contains(&self, identifier: &str) -> Result<bool> {
        match self.item(identifier).await {
            Ok(_) => Ok(true),
            Err(KeychainError::ItemNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Store a new item
    ///
    /// Fails with [`KeychainError::DuplicateItem`] if the identifier is taken.
    pub async fn add(&self, item: &Item) -> Result<()> {
        log::debug!("Adding item '{}' to '{}'", item.identifier(), self.service_name);

        self.storage
            .put(&self.service_name, item, WriteMode::Create)
            .await
            .map_err(|e| KeychainError::from_backend(item.identifier(), e))?;

        self.listeners.notify(&KeychainEvent::ItemAdded {
            service: self.service_name.clone(),
            item: item.clone(),
        });
        Ok(())
    }

    /// Replace the stored item that has the same identifier
    ///
    /// The item's password is left untouched.
    pub async fn update(&self, item: &Item) -> Result<()> {
        log::debug!("Updating item '{}' in '{}'", item.identifier(), self.service_name);

        self.storage
            .put(&self.service_name, item, WriteMode::Replace)
            .await
            .map_err(|e| KeychainError::from_backend(item.identifier(), e))?;

        self.listeners.notify(&KeychainEvent::ItemUpdated {
            service: self.service_name.clone(),
            item: item.clone(),
        });
        Ok(())
    }

    /// Remove the item with the same identifier, and its password
    pub async fn remove(&self, item: &Item) -> Result<()> {
        log::debug!("Removing item '{}' from '{}'", item.identifier(), self.service_name);

        self.storage
            .delete(&self.service_name, item.identifier())
            .await
            .map_err(|e| KeychainError::from_backend(item.identifier(), e))?;

        self.listeners.notify(&KeychainEvent::ItemRemoved {
            service: self.service_name.clone(),
            item: item.clone(),
        });
        Ok(())
    }

    /// Remove every item and password of this service
    pub async fn remove_all_items(&self) -> Result<()> {
        log::debug!("Removing all items from '{}'", self.service_name);

        self.storage
            .clear(&self.service_name)
            .await
            .map_err(KeychainError::Backend)?;

        self.listeners.notify(&KeychainEvent::AllItemsRemoved {
            service: self.service_name.clone(),
        });
        Ok(())
    }

    /// Fetch the password of an item
    ///
    /// Fails with [`KeychainError::ItemNotFound`] if there is no such item and
    /// with [`KeychainError::NoPassword`] if the item has no password.
    pub async fn password_for_item(&self, identifier: &str) -> Result<Password> {
        self.storage
            .get_secret(&self.service_name, identifier)
            .await
            .map_err(|e| KeychainError::from_backend(identifier, e))?
            .ok_or_else(|| KeychainError::no_password(identifier))
    }

    /// Set or clear (`None`) the password of an existing item
    pub async fn set_password(&self, password: Option<&str>, identifier: &str) -> Result<()> {
        log::debug!(
            "{} password of '{identifier}' in '{}'",
            if password.is_some() { "Setting" } else { "Clearing" },
            self.service_name
        );

        let password = password.map(Password::new);
        self.storage
            .put_secret(&self.service_name, identifier, password.as_ref())
            .await
            .map_err(|e| KeychainError::from_backend(identifier, e))
    }

    /// Register a listener for change events
    ///
    /// The keychain keeps only a weak reference; the caller owns the listener.
    pub fn register_listener(&self, listener: &Arc<dyn KeychainListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    /// Unregister a listener; returns `false` if the id was unknown
    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Number of registered listeners still alive
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for Keychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("service_name", &self.service_name)
            .field("storage", &self.storage.name())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;

    fn keychain(service: &str) -> Keychain {
        Keychain::new(service, Arc::new(MemoryStorage::new())).unwrap()
    }

    #[test]
    fn test_blank_service_name_is_rejected() {
        let storage: Arc<dyn SecureStorage> = Arc::new(MemoryStorage::new());
        assert!(matches!(
            Keychain::new("", storage.clone()),
            Err(KeychainError::InvalidServiceName)
        ));
        assert!(matches!(
            Keychain::new("  ", storage),
            Err(KeychainError::InvalidServiceName)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_add_is_distinct_from_update() {
        let keychain = keychain("svc");
        let item = Item::visible("mail");

        keychain.add(&item).await.unwrap();
        let err = keychain.add(&item).await.unwrap_err();
        assert!(matches!(err, KeychainError::DuplicateItem { ref identifier } if identifier == "mail"));
    }

    #[tokio::test]
    async fn test_update_preserves_password() {
        let keychain = keychain("svc");
        keychain.add(&Item::visible("mail")).await.unwrap();
        keychain.set_password(Some("pw"), "mail").await.unwrap();

        keychain
            .update(&Item::visible("mail").with_option("host", "example.org"))
            .await
            .unwrap();

        let password = keychain.password_for_item("mail").await.unwrap();
        assert_eq!(password.to_str().unwrap(), "pw");
    }

    #[tokio::test]
    async fn test_contains() {
        let keychain = keychain("svc");
        assert!(!keychain.contains("mail").await.unwrap());
        keychain.add(&Item::visible("mail")).await.unwrap();
        assert!(keychain.contains("mail").await.unwrap());
    }

    #[tokio::test]
    async fn test_debug_output() {
        let keychain = keychain("svc");
        let debug_str = format!("{keychain:?}");
        assert!(debug_str.contains("svc"));
        assert!(debug_str.contains("Memory Storage"));
    }
}
