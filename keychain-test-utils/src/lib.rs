//! Test utilities for keychain-rs
//!
//! This crate provides mock storage, recording listeners, and item fixtures
//! for testing keychain functionality.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{TEST_KDF, TestKeychain, sample_item, sample_items};
pub use mocks::{FailureKind, MockStorage, RecordingListener, StorageOp};

/// Route `log` output through the test harness
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
