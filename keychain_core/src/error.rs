//! Error types for the keychain core library
//!
//! Store operations surface [`KeychainError`]. Storage backends report
//! [`BackendError`], which the store translates into the store taxonomy.
//! Configuration loading has its own [`ConfigError`].

use thiserror::Error;

pub mod backend;
pub mod config;

pub use self::backend::BackendError;
pub use self::config::ConfigError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, KeychainError>;

/// Main error type returned by [`crate::Keychain`] operations
///
/// Every failing store operation reports exactly one of these kinds.
/// Nothing is retried internally; see [`KeychainError::is_retryable`].
#[derive(Error, Debug)]
pub enum KeychainError {
    /// No item with this identifier exists in the service scope
    #[error("Item not found: {identifier}")]
    ItemNotFound { identifier: String },

    /// The item exists but carries no password
    #[error("No password stored for item: {identifier}")]
    NoPassword { identifier: String },

    /// An item with this identifier already exists in the service scope
    #[error("Item already exists: {identifier}")]
    DuplicateItem { identifier: String },

    /// The storage backend failed
    #[error("Storage backend failure: {0}")]
    Backend(#[source] BackendError),

    /// The service name given at construction was empty
    #[error("Service name must not be empty")]
    InvalidServiceName,

    /// Unclassified failure
    #[error("Undefined keychain error: {message}")]
    Undefined { message: String },
}

impl KeychainError {
    /// Create an item-not-found error
    pub fn item_not_found(identifier: impl Into<String>) -> Self {
        Self::ItemNotFound {
            identifier: identifier.into(),
        }
    }

    /// Create a no-password error
    pub fn no_password(identifier: impl Into<String>) -> Self {
        Self::NoPassword {
            identifier: identifier.into(),
        }
    }

    /// Create a duplicate-item error
    pub fn duplicate_item(identifier: impl Into<String>) -> Self {
        Self::DuplicateItem {
            identifier: identifier.into(),
        }
    }

    /// Create an undefined error
    pub fn undefined(message: impl Into<String>) -> Self {
        Self::Undefined {
            message: message.into(),
        }
    }

    /// Translate a backend failure for an operation addressing `identifier`
    ///
    /// `NotFound` and `AlreadyExists` become store-level kinds; every other
    /// backend failure is wrapped with its diagnostic intact.
    pub fn from_backend(identifier: &str, err: BackendError) -> Self {
        match err {
            BackendError::NotFound(_) => Self::item_not_found(identifier),
            BackendError::AlreadyExists(_) => Self::duplicate_item(identifier),
            other => Self::Backend(other),
        }
    }

    /// Whether the caller may reasonably retry the operation later
    ///
    /// Only backend conditions that are commonly transient qualify, such as
    /// a locked vault or an I/O hiccup.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<BackendError> for KeychainError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}
