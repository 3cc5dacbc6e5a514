//! Storage backend error types

use thiserror::Error;

/// Errors reported by a [`crate::backend::SecureStorage`] implementation
#[derive(Debug, Error)]
pub enum BackendError {
    /// The addressed entry does not exist
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// An entry with the same identifier already exists
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    /// The storage refused access (locked vault, permission denial)
    #[error("Failed to access secure storage: {0}")]
    AccessDenied(String),

    /// Stored data is corrupted or in an unknown format
    #[error("Corrupted storage data: {0}")]
    CorruptedData(String),

    /// Platform-specific failure
    #[error("Platform error: {0}")]
    Platform(String),

    /// Encryption or decryption failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The operation is not supported by this backend
    #[error("Operation not supported by this storage backend")]
    NotSupported,
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied(reason.into())
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::CorruptedData(reason.into())
    }

    pub fn crypto(reason: impl Into<String>) -> Self {
        Self::Crypto(reason.into())
    }

    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization(reason.into())
    }

    /// Whether this failure is likely to clear up on its own
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AccessDenied(_) => true,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
