//! Mock implementations for testing

mod listener;
mod storage;

pub use listener::RecordingListener;
pub use storage::{FailureKind, MockStorage, StorageOp};
