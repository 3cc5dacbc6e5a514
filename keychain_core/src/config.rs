//! Backend configuration
//!
//! Selects and locates the storage backend. Values are layered with figment:
//! built-in defaults, then an optional TOML file, then `KEYCHAIN_*`
//! environment variables. The service name is not part of the
//! configuration; it is the only parameter of [`crate::Keychain::new`].

use crate::backend::{EncryptedFileStorage, MemoryStorage, SecureStorage};
use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "KEYCHAIN_";

/// Which storage backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    #[default]
    EncryptedFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeychainConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Directory of the encrypted store; defaults to the platform config dir
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl KeychainConfig {
    /// Layered figment: defaults, optional TOML file, environment
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration from all layers
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(config_file))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// Directory the encrypted backend will use
    pub fn resolve_store_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.store_dir {
            return Ok(dir.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("keychain-rs").join("store"))
            .ok_or(ConfigError::NoStoreDirectory)
    }
}

/// Open the storage backend described by `config`
pub async fn open_storage(config: &KeychainConfig) -> Result<Arc<dyn SecureStorage>, ConfigError> {
    let storage: Arc<dyn SecureStorage> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryStorage::new()),
        BackendKind::EncryptedFile => {
            let dir = config.resolve_store_dir()?;
            log::debug!("Opening encrypted store in {}", dir.display());
            Arc::new(EncryptedFileStorage::open(dir).await?)
        }
    };
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KeychainConfig::default();
        assert_eq!(config.backend, BackendKind::EncryptedFile);
        assert!(config.store_dir.is_none());
    }

    #[test]
    fn test_explicit_store_dir_wins() {
        let config = KeychainConfig {
            backend: BackendKind::EncryptedFile,
            store_dir: Some(PathBuf::from("/tmp/keychain-test")),
        };
        assert_eq!(
            config.resolve_store_dir().unwrap(),
            PathBuf::from("/tmp/keychain-test")
        );
    }

    #[test]
    fn test_figment_overrides() {
        let figment = Figment::from(Serialized::defaults(KeychainConfig::default()))
            .merge(Serialized::default("backend", "memory"))
            .merge(Serialized::default("store_dir", "/var/lib/keychain"));

        let config = KeychainConfig::from_figment(&figment).unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.store_dir, Some(PathBuf::from("/var/lib/keychain")));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let figment = Figment::from(Serialized::defaults(KeychainConfig::default()))
            .merge(Serialized::default("backend", "cloud"));

        assert!(matches!(
            KeychainConfig::from_figment(&figment),
            Err(ConfigError::Extract(_))
        ));
    }

    #[tokio::test]
    async fn test_open_memory_storage() {
        let config = KeychainConfig {
            backend: BackendKind::Memory,
            store_dir: None,
        };
        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.name(), "Memory Storage");
    }
}
