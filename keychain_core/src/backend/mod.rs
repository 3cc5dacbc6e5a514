//! Secure storage backends
//!
//! A [`SecureStorage`] owns the durable mapping from
//! `(scope, identifier)` to an item and its optional password. The
//! [`crate::Keychain`] never touches storage directly; it issues exactly one
//! backend call per operation and leaves atomicity to the backend.

use crate::error::BackendError;
use crate::item::Item;
use crate::secret::Password;
use async_trait::async_trait;

pub mod encrypted_file;
pub mod memory;

pub use encrypted_file::{EncryptedFileStorage, KdfParams};
pub use memory::MemoryStorage;

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// How [`SecureStorage::put`] treats an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert a new entry; fail with `AlreadyExists` if the identifier is taken
    Create,
    /// Replace an existing entry; fail with `NotFound` if it is absent.
    /// The stored password is kept.
    Replace,
}

/// Storage facility that persists items and passwords per scope
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Write an item's metadata
    async fn put(&self, scope: &str, item: &Item, mode: WriteMode) -> BackendResult<()>;

    /// Read an item
    ///
    /// Returns `Err(BackendError::NotFound)` if no such item exists.
    async fn get(&self, scope: &str, identifier: &str) -> BackendResult<Item>;

    /// Delete an item together with its password
    async fn delete(&self, scope: &str, identifier: &str) -> BackendResult<()>;

    /// List every item in the scope, ordered by identifier
    async fn list(&self, scope: &str) -> BackendResult<Vec<Item>>;

    /// Set or clear the password of an existing item
    async fn put_secret(
        &self,
        scope: &str,
        identifier: &str,
        secret: Option<&Password>,
    ) -> BackendResult<()>;

    /// Read the password of an existing item
    ///
    /// `Ok(None)` means the item exists without a password.
    async fn get_secret(&self, scope: &str, identifier: &str) -> BackendResult<Option<Password>>;

    /// Remove every item and password in the scope
    ///
    /// Must be atomic: afterwards no item of the scope is observable, and on
    /// failure the scope is left as it was.
    async fn clear(&self, scope: &str) -> BackendResult<()>;

    /// Get the name of this storage backend
    fn name(&self) -> &str;
}

/// Key used in backend diagnostics
pub(crate) fn entry_key(scope: &str, identifier: &str) -> String {
    format!("{scope}/{identifier}")
}
