//! Mock storage backend with call counting and failure injection

use async_trait::async_trait;
use keychain_core::backend::BackendResult;
use keychain_core::{BackendError, Item, MemoryStorage, Password, SecureStorage, WriteMode};
use std::collections::HashMap;
use std::sync::Mutex;

/// Backend operations that can be counted or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Put,
    Get,
    Delete,
    List,
    PutSecret,
    GetSecret,
    Clear,
}

/// Kind of failure to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Storage is locked or permission was denied
    Locked,
    /// An I/O error
    Io,
    /// The stored data is unreadable
    Corrupted,
}

impl FailureKind {
    fn to_error(self) -> BackendError {
        match self {
            Self::Locked => BackendError::access_denied("mock storage is locked"),
            Self::Io => BackendError::Io(std::io::Error::other("mock disk failure")),
            Self::Corrupted => BackendError::corrupted("mock corruption"),
        }
    }
}

/// In-memory storage that records calls and fails on demand
#[derive(Default)]
pub struct MockStorage {
    inner: MemoryStorage,
    calls: Mutex<HashMap<StorageOp, usize>>,
    failures: Mutex<HashMap<StorageOp, FailureKind>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `op` fail with `kind`
    pub fn fail_on(&self, op: StorageOp, kind: FailureKind) {
        self.failures.lock().unwrap().insert(op, kind);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Number of times `op` was called
    pub fn calls(&self, op: StorageOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Total number of backend calls
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, op: StorageOp) -> BackendResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        match self.failures.lock().unwrap().get(&op) {
            Some(kind) => Err(kind.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecureStorage for MockStorage {
    async fn put(&self, scope: &str, item: &Item, mode: WriteMode) -> BackendResult<()> {
        self.record(StorageOp::Put)?;
        self.inner.put(scope, item, mode).await
    }

    async fn get(&self, scope: &str, identifier: &str) -> BackendResult<Item> {
        self.record(StorageOp::Get)?;
        self.inner.get(scope, identifier).await
    }

    async fn delete(&self, scope: &str, identifier: &str) -> BackendResult<()> {
        self.record(StorageOp::Delete)?;
        self.inner.delete(scope, identifier).await
    }

    async fn list(&self, scope: &str) -> BackendResult<Vec<Item>> {
        self.record(StorageOp::List)?;
        self.inner.list(scope).await
    }

    async fn put_secret(
        &self,
        scope: &str,
        identifier: &str,
        secret: Option<&Password>,
    ) -> BackendResult<()> {
        self.record(StorageOp::PutSecret)?;
        self.inner.put_secret(scope, identifier, secret).await
    }

    async fn get_secret(&self, scope: &str, identifier: &str) -> BackendResult<Option<Password>> {
        self.record(StorageOp::GetSecret)?;
        self.inner.get_secret(scope, identifier).await
    }

    async fn clear(&self, scope: &str) -> BackendResult<()> {
        self.record(StorageOp::Clear)?;
        self.inner.clear(scope).await
    }

    fn name(&self) -> &str {
        "Mock Storage"
    }
}
