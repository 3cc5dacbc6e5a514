//! Configuration error types

use thiserror::Error;

/// Errors raised while loading [`crate::config::KeychainConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment could not extract the layered configuration
    #[error("Invalid keychain configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// No store directory was configured and none could be derived
    #[error("Could not determine a directory for the encrypted store")]
    NoStoreDirectory,

    /// The configured backend could not be opened
    #[error("Failed to open storage backend: {0}")]
    Storage(#[from] super::BackendError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}
