//! Keychain Core Library
//!
//! Service-scoped credential storage: items carrying metadata, passwords
//! kept apart from items, change notifications, and pluggable secure storage
//! backends.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod item;
pub mod keychain;
pub mod secret;

// Re-export main types
pub use backend::{EncryptedFileStorage, MemoryStorage, SecureStorage, WriteMode};
pub use config::{BackendKind, KeychainConfig, open_storage};
pub use error::{BackendError, ConfigError, KeychainError, Result};
pub use events::{ChannelListener, KeychainEvent, KeychainListener, ListenerId};
pub use item::{Item, OptionValue, Options};
pub use keychain::Keychain;
pub use secret::Password;
