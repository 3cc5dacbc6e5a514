use keychain_core::{KeychainEvent, KeychainListener};
use std::sync::Mutex;

/// Listener that records every event it receives
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<KeychainEvent>>,
}

impl RecordingListener {
    /// Snapshot of the recorded events, oldest first
    pub fn events(&self) -> Vec<KeychainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the recorded events
    pub fn take(&self) -> Vec<KeychainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl KeychainListener for RecordingListener {
    fn on_event(&self, event: &KeychainEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
