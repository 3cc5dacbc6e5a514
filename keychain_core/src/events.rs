//! Change notifications
//!
//! A [`crate::Keychain`] announces every successful mutation to its
//! registered [`KeychainListener`]s. Delivery is synchronous: listeners run
//! on the caller's task, inside the mutating call, right after the backend
//! confirmed the change. The keychain holds listeners weakly, so dropping the
//! last `Arc` to a listener unregisters it.

use crate::item::Item;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;

/// A change applied to a keychain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeychainEvent {
    ItemAdded { service: String, item: Item },
    ItemUpdated { service: String, item: Item },
    ItemRemoved { service: String, item: Item },
    AllItemsRemoved { service: String },
}

impl KeychainEvent {
    /// Service name of the keychain that emitted the event
    pub fn service(&self) -> &str {
        match self {
            Self::ItemAdded { service, .. }
            | Self::ItemUpdated { service, .. }
            | Self::ItemRemoved { service, .. }
            | Self::AllItemsRemoved { service } => service,
        }
    }

    /// The affected item, if the event concerns a single item
    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::ItemAdded { item, .. }
            | Self::ItemUpdated { item, .. }
            | Self::ItemRemoved { item, .. } => Some(item),
            Self::AllItemsRemoved { .. } => None,
        }
    }
}

/// Observer of keychain changes
///
/// Handlers run inside the mutating call. Long work should be handed off,
/// for example through a [`ChannelListener`].
pub trait KeychainListener: Send + Sync {
    fn on_event(&self, event: &KeychainEvent);
}

/// Handle returned by listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Weakly held set of listeners
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<ListenerId, Weak<dyn KeychainListener>>>,
}

impl ListenerSet {
    pub(crate) fn register(&self, listener: &Arc<dyn KeychainListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.insert(id, Arc::downgrade(listener));
        id
    }

    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id)
            .is_some()
    }

    /// Number of listeners that are still alive
    pub(crate) fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }

    /// Deliver an event to every live listener
    ///
    /// A panicking listener is logged and skipped; it never fails the
    /// operation that produced the event. Dropped listeners are pruned.
    pub(crate) fn notify(&self, event: &KeychainEvent) {
        // Collect first so listeners may (un)register without deadlocking.
        let (live, dead): (Vec<_>, Vec<_>) = {
            let listeners = self
                .listeners
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners
                .iter()
                .map(|(id, weak)| (*id, weak.upgrade()))
                .partition(|(_, listener)| listener.is_some())
        };

        if !dead.is_empty() {
            let mut listeners = self
                .listeners
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for (id, _) in dead {
                listeners.remove(&id);
            }
        }

        for (id, listener) in live {
            let Some(listener) = listener else { continue };
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                log::warn!(
                    "Keychain listener {id:?} panicked while handling event for service '{}'",
                    event.service()
                );
            }
        }
    }
}

/// Listener that forwards events into a tokio channel
///
/// Sending never blocks. If the receiver is gone the event is dropped and a
/// warning is logged.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<KeychainEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving half of its channel
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<KeychainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl KeychainListener for ChannelListener {
    fn on_event(&self, event: &KeychainEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::warn!(
                "Dropping keychain event for service '{}': receiver closed",
                event.service()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<KeychainEvent>>);

    impl KeychainListener for Collect {
        fn on_event(&self, event: &KeychainEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    struct Panics;

    impl KeychainListener for Panics {
        fn on_event(&self, _event: &KeychainEvent) {
            panic!("listener failure");
        }
    }

    fn cleared() -> KeychainEvent {
        KeychainEvent::AllItemsRemoved {
            service: "svc".to_string(),
        }
    }

    #[test]
    fn test_register_and_notify() {
        let set = ListenerSet::default();
        let collect = Arc::new(Collect::default());
        let listener: Arc<dyn KeychainListener> = collect.clone();

        set.register(&listener);
        set.notify(&cleared());

        assert_eq!(collect.0.lock().unwrap().as_slice(), &[cleared()]);
    }

    #[test]
    fn test_unregister() {
        let set = ListenerSet::default();
        let collect = Arc::new(Collect::default());
        let listener: Arc<dyn KeychainListener> = collect.clone();

        let id = set.register(&listener);
        assert!(set.unregister(id));
        assert!(!set.unregister(id));

        set.notify(&cleared());
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let set = ListenerSet::default();
        let listener: Arc<dyn KeychainListener> = Arc::new(Collect::default());
        set.register(&listener);
        assert_eq!(set.len(), 1);

        drop(listener);
        assert_eq!(set.len(), 0);

        set.notify(&cleared());
        assert!(set.listeners.read().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let set = ListenerSet::default();
        let panics: Arc<dyn KeychainListener> = Arc::new(Panics);
        let collect = Arc::new(Collect::default());
        let listener: Arc<dyn KeychainListener> = collect.clone();

        set.register(&panics);
        set.register(&listener);
        set.notify(&cleared());

        assert_eq!(collect.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_event_accessors() {
        let item = Item::visible("mail");
        let event = KeychainEvent::ItemUpdated {
            service: "svc".to_string(),
            item: item.clone(),
        };
        assert_eq!(event.service(), "svc");
        assert_eq!(event.item(), Some(&item));
        assert_eq!(cleared().item(), None);
    }

    #[tokio::test]
    async fn test_channel_listener_forwards_events() {
        let (listener, mut rx) = ChannelListener::new();
        listener.on_event(&cleared());
        assert_eq!(rx.recv().await, Some(cleared()));

        drop(rx);
        // Closed receiver must not panic.
        listener.on_event(&cleared());
    }
}
