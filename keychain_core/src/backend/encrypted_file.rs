//! Durable storage backend using an encrypted file
//!
//! All scopes share one JSON document inside the store directory. Each entry
//! (item plus optional password) is sealed with AES-256-GCM; the entry key
//! `scope/identifier` is bound as associated data so sealed entries cannot be
//! moved between identifiers. The cipher key is derived with Argon2id from a
//! random master key kept beside the document.
//!
//! Every load-modify-save cycle holds an exclusive advisory lock on
//! `.lock` in the store directory, which serializes writers across instances
//! and processes. Writes replace the document through a uniquely named
//! temporary file and an atomic rename, so readers see either the old or the
//! new document, never a mix.

use super::{BackendResult, SecureStorage, WriteMode, entry_key};
use crate::error::BackendError;
use crate::item::Item;
use crate::secret::Password;
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use argon2::{Algorithm, Argon2, Params, Version, password_hash::SaltString};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use zeroize::Zeroize;

const STORE_FORMAT_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "store.enc";
const KEY_FILE_NAME: &str = ".key";
const LOCK_FILE_NAME: &str = ".lock";
const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Argon2id cost parameters for deriving the cipher key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Encrypted keychain storage in a local directory
pub struct EncryptedFileStorage {
    store_dir: PathBuf,
    file_path: PathBuf,
    master_key: Password,
    kdf: KdfParams,
    /// Cipher key derived for the salt of the last document seen
    derived: Mutex<Option<(String, Key<Aes256Gcm>)>>,
    /// Queues this instance's writers before they contend for the file lock
    write_lock: AsyncMutex<()>,
}

/// On-disk document
#[derive(Serialize, Deserialize)]
struct StoreDocument {
    version: u32,

    /// Salt for key derivation
    salt: String,

    /// scope -> identifier -> sealed entry
    #[serde(default)]
    scopes: BTreeMap<String, BTreeMap<String, SealedEntry>>,
}

#[derive(Serialize, Deserialize)]
struct SealedEntry {
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    modified_at: chrono::DateTime<chrono::Utc>,
}

/// Plaintext content of a sealed entry
#[derive(Serialize, Deserialize)]
struct PlainEntry {
    item: Item,
    secret: Option<Vec<u8>>,
}

impl Drop for PlainEntry {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl StoreDocument {
    fn empty() -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            salt: SaltString::generate(&mut OsRng).to_string(),
            scopes: BTreeMap::new(),
        }
    }
}

impl EncryptedFileStorage {
    /// Open (or create) a store in `store_dir`
    ///
    /// The directory and its master key are created on first use.
    pub async fn open(store_dir: impl AsRef<Path>) -> BackendResult<Self> {
        let store_dir = store_dir.as_ref();
        fs::create_dir_all(store_dir).await?;

        let master_key = Self::load_or_create_master_key(store_dir).await?;

        Ok(Self {
            store_dir: store_dir.to_path_buf(),
            file_path: store_dir.join(STORE_FILE_NAME),
            master_key,
            kdf: KdfParams::default(),
            derived: Mutex::new(None),
            write_lock: AsyncMutex::new(()),
        })
    }

    /// Use different Argon2id cost parameters
    ///
    /// Every process opening the same directory must use the same parameters.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self.derived = Mutex::new(None);
        self
    }

    /// Path of the encrypted document
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn load_or_create_master_key(store_dir: &Path) -> BackendResult<Password> {
        let key_file = store_dir.join(KEY_FILE_NAME);

        match Self::read_master_key(&key_file).await {
            Err(BackendError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
            other => return other,
        }

        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut key_vec = key.to_vec();

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = match options.open(&key_file).await {
            Ok(file) => file,
            // Another process won the race; use its key.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                key_vec.zeroize();
                return Self::read_master_key(&key_file).await;
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&key_vec).await?;
        file.sync_all().await?;
        log::info!("Created new master key at {}", key_file.display());

        Ok(Password::from_bytes(key_vec))
    }

    async fn read_master_key(key_file: &Path) -> BackendResult<Password> {
        let bytes = fs::read(key_file).await?;
        if bytes.len() != MASTER_KEY_LEN {
            log::warn!(
                "Master key at {} has unexpected length {}",
                key_file.display(),
                bytes.len()
            );
            return Err(BackendError::corrupted(format!(
                "master key has {} bytes, expected {MASTER_KEY_LEN}",
                bytes.len()
            )));
        }
        Ok(Password::from_bytes(bytes))
    }

    /// Derive the cipher key for a document salt
    fn derive_key(&self, salt: &str) -> BackendResult<Key<Aes256Gcm>> {
        let salt = SaltString::from_b64(salt).map_err(|e| BackendError::corrupted(e.to_string()))?;
        let params = Params::new(
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
            Some(32),
        )
        .map_err(|e| BackendError::crypto(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key_bytes = [0u8; 32];
        argon2
            .hash_password_into(
                self.master_key.as_bytes(),
                salt.as_str().as_bytes(),
                &mut key_bytes,
            )
            .map_err(|e| BackendError::crypto(e.to_string()))?;

        let key = *Key::<Aes256Gcm>::from_slice(&key_bytes);
        key_bytes.zeroize();
        Ok(key)
    }

    fn cipher(&self, salt: &str) -> BackendResult<Aes256Gcm> {
        let mut derived = self
            .derived
            .lock()
            .map_err(|_| BackendError::Platform("key cache lock poisoned".to_string()))?;

        if let Some((cached_salt, key)) = derived.as_ref()
            && cached_salt == salt
        {
            return Ok(Aes256Gcm::new(key));
        }

        let key = self.derive_key(salt)?;
        let cipher = Aes256Gcm::new(&key);
        *derived = Some((salt.to_string(), key));
        Ok(cipher)
    }

    async fn load_document(&self) -> BackendResult<StoreDocument> {
        let data = match fs::read(&self.file_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreDocument::empty()),
            Err(e) => return Err(e.into()),
        };

        let document: StoreDocument =
            serde_json::from_slice(&data).map_err(|e| BackendError::corrupted(e.to_string()))?;

        if document.version != STORE_FORMAT_VERSION {
            return Err(BackendError::corrupted(format!(
                "unsupported store format version {}",
                document.version
            )));
        }
        Ok(document)
    }

    async fn save_document(&self, document: &StoreDocument) -> BackendResult<()> {
        let data = serde_json::to_vec_pretty(document)?;
        let is_new = !fs::try_exists(&self.file_path).await.unwrap_or(false);

        let store_dir = self.store_dir.clone();
        let file_path = self.file_path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            // Created with 0600 on unix
            let mut temp = tempfile::NamedTempFile::new_in(&store_dir)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&file_path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| BackendError::Platform(format!("store write task failed: {e}")))??;

        if is_new {
            log::info!("Created encrypted store at {}", self.file_path.display());
        }
        Ok(())
    }

    /// Take the exclusive store lock, blocking until other writers release it
    ///
    /// The lock is released when the returned file is dropped.
    async fn lock_store(&self) -> BackendResult<std::fs::File> {
        let lock_path = self.store_dir.join(LOCK_FILE_NAME);
        let file = tokio::task::spawn_blocking(move || -> io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            file.lock()?;
            Ok(file)
        })
        .await
        .map_err(|e| BackendError::Platform(format!("store lock task failed: {e}")))??;
        Ok(file)
    }

    /// Run one load-modify-save cycle under the store lock
    ///
    /// The document is only written back when `op` succeeds.
    async fn modify<T, F>(&self, op: F) -> BackendResult<T>
    where
        T: Send,
        F: FnOnce(&mut StoreDocument) -> BackendResult<T> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let _store_lock = self.lock_store().await?;

        let mut document = self.load_document().await?;
        let result = op(&mut document)?;
        self.save_document(&document).await?;
        Ok(result)
    }

    /// Load the document and open one entry
    async fn read_entry(&self, scope: &str, identifier: &str) -> BackendResult<PlainEntry> {
        let document = self.load_document().await?;
        let sealed = document
            .scopes
            .get(scope)
            .and_then(|entries| entries.get(identifier))
            .ok_or_else(|| BackendError::not_found(entry_key(scope, identifier)))?;

        let cipher = self.cipher(&document.salt)?;
        open_entry(&cipher, scope, identifier, sealed)
    }
}

fn seal_entry(cipher: &Aes256Gcm, scope: &str, entry: &PlainEntry) -> BackendResult<SealedEntry> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let aad = entry_key(scope, entry.item.identifier());

    let mut plaintext = serde_json::to_vec(entry)?;
    let ciphertext = cipher.encrypt(
        &nonce,
        Payload {
            msg: &plaintext,
            aad: aad.as_bytes(),
        },
    );
    plaintext.zeroize();

    Ok(SealedEntry {
        nonce: nonce.to_vec(),
        ciphertext: ciphertext.map_err(|e| BackendError::crypto(e.to_string()))?,
        modified_at: chrono::Utc::now(),
    })
}

fn open_entry(
    cipher: &Aes256Gcm,
    scope: &str,
    identifier: &str,
    sealed: &SealedEntry,
) -> BackendResult<PlainEntry> {
    let aad = entry_key(scope, identifier);
    if sealed.nonce.len() != NONCE_LEN {
        return Err(BackendError::corrupted(format!("bad nonce length for {aad}")));
    }

    let mut plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|e| BackendError::crypto(format!("Decryption failed for {aad}: {e}")))?;

    let entry = serde_json::from_slice::<PlainEntry>(&plaintext);
    plaintext.zeroize();
    let entry = entry.map_err(|e| BackendError::corrupted(e.to_string()))?;

    if entry.item.identifier() != identifier {
        return Err(BackendError::corrupted(format!(
            "entry {aad} holds item {}",
            entry.item.identifier()
        )));
    }
    Ok(entry)
}

#[async_trait]
impl SecureStorage for EncryptedFileStorage {
    async fn put(&self, scope: &str, item: &Item, mode: WriteMode) -> BackendResult<()> {
        self.modify(|document| {
            let cipher = self.cipher(&document.salt)?;
            let entries = document.scopes.entry(scope.to_string()).or_default();
            let identifier = item.identifier();

            let secret = match (mode, entries.get(identifier)) {
                (WriteMode::Create, Some(_)) => {
                    return Err(BackendError::already_exists(entry_key(scope, identifier)));
                }
                (WriteMode::Create, None) => None,
                (WriteMode::Replace, Some(sealed)) => {
                    open_entry(&cipher, scope, identifier, sealed)?.secret.take()
                }
                (WriteMode::Replace, None) => {
                    return Err(BackendError::not_found(entry_key(scope, identifier)));
                }
            };

            let entry = PlainEntry {
                item: item.clone(),
                secret,
            };
            let sealed = seal_entry(&cipher, scope, &entry)?;
            entries.insert(identifier.to_string(), sealed);
            Ok(())
        })
        .await
    }

    async fn get(&self, scope: &str, identifier: &str) -> BackendResult<Item> {
        let entry = self.read_entry(scope, identifier).await?;
        Ok(entry.item.clone())
    }

    async fn delete(&self, scope: &str, identifier: &str) -> BackendResult<()> {
        self.modify(|document| {
            let entries = document
                .scopes
                .get_mut(scope)
                .ok_or_else(|| BackendError::not_found(entry_key(scope, identifier)))?;

            if entries.remove(identifier).is_none() {
                return Err(BackendError::not_found(entry_key(scope, identifier)));
            }

            // Remove scope if no entries left
            if entries.is_empty() {
                document.scopes.remove(scope);
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, scope: &str) -> BackendResult<Vec<Item>> {
        let document = self.load_document().await?;
        let Some(entries) = document.scopes.get(scope) else {
            return Ok(Vec::new());
        };

        let cipher = self.cipher(&document.salt)?;
        entries
            .iter()
            .map(|(identifier, sealed)| {
                open_entry(&cipher, scope, identifier, sealed).map(|entry| entry.item.clone())
            })
            .collect()
    }

    async fn put_secret(
        &self,
        scope: &str,
        identifier: &str,
        secret: Option<&Password>,
    ) -> BackendResult<()> {
        self.modify(|document| {
            let cipher = self.cipher(&document.salt)?;
            let sealed = document
                .scopes
                .get_mut(scope)
                .and_then(|entries| entries.get_mut(identifier))
                .ok_or_else(|| BackendError::not_found(entry_key(scope, identifier)))?;

            let mut entry = open_entry(&cipher, scope, identifier, sealed)?;
            entry.secret.zeroize();
            entry.secret = secret.map(|password| password.as_bytes().to_vec());
            *sealed = seal_entry(&cipher, scope, &entry)?;
            Ok(())
        })
        .await
    }

    async fn get_secret(&self, scope: &str, identifier: &str) -> BackendResult<Option<Password>> {
        let mut entry = self.read_entry(scope, identifier).await?;
        Ok(entry.secret.take().map(Password::from_bytes))
    }

    async fn clear(&self, scope: &str) -> BackendResult<()> {
        self.modify(|document| {
            document.scopes.remove(scope);
            Ok(())
        })
        .await
    }

    fn name(&self) -> &str {
        "Encrypted File Storage"
    }
}
