//! Keychain test harness

use crate::mocks::{MockStorage, RecordingListener};
use keychain_core::backend::KdfParams;
use keychain_core::{EncryptedFileStorage, Keychain, KeychainListener, MemoryStorage};
use std::sync::Arc;
use tempfile::TempDir;

/// Argon2id parameters cheap enough for debug-build tests
pub const TEST_KDF: KdfParams = KdfParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};

/// A keychain wired to a recording listener
///
/// Keeps the listener (and, for file-backed keychains, the temp directory)
/// alive for as long as the harness lives.
pub struct TestKeychain {
    pub keychain: Keychain,
    pub listener: Arc<RecordingListener>,
    _temp_dir: Option<TempDir>,
}

impl TestKeychain {
    /// Keychain over fresh in-memory storage
    pub fn memory(service: &str) -> Self {
        Self::with_storage(service, Arc::new(MemoryStorage::new()), None)
    }

    /// Keychain over a mock storage the caller can inspect and break
    pub fn mock(service: &str, storage: Arc<MockStorage>) -> Self {
        Self::with_storage(service, storage, None)
    }

    /// Keychain over an encrypted file store in a new temp directory
    pub async fn encrypted_file(service: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let storage = EncryptedFileStorage::open(temp_dir.path().join("store"))
            .await
            .expect("failed to open encrypted store")
            .with_kdf_params(TEST_KDF);
        Self::with_storage(service, Arc::new(storage), Some(temp_dir))
    }

    fn with_storage(
        service: &str,
        storage: Arc<dyn keychain_core::SecureStorage>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        crate::init_test_logging();

        let keychain = Keychain::new(service, storage).expect("valid service name");
        let listener = Arc::new(RecordingListener::default());
        let dyn_listener: Arc<dyn KeychainListener> = listener.clone();
        keychain.register_listener(&dyn_listener);

        Self {
            keychain,
            listener,
            _temp_dir: temp_dir,
        }
    }
}
