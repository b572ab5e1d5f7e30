//! Change event bus (§4.8): synchronous fan-out of store/folder/message
//! lifecycle events, in subscriber registration order, isolating one
//! subscriber's panic from the rest.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    FolderAdded,
    FolderRemoved,
    FolderUpdated,
    MessageAdded,
    MessageRemoved,
    MessageUpdated,
    CacheModeChanged,
    StoreOpened,
    StoreClosed,
}

/// What the event refers to: an account, a folder path, or a message-id
/// scoped to a folder path.
#[derive(Debug, Clone)]
pub enum ChangedItem {
    Account(String),
    Folder { folder_path: String },
    Message { folder_path: String, message_id: String },
}

/// One delivered event: the account the originating store belongs to, the
/// kind of change, and the item it refers to.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub source_account_id: String,
    pub kind: EventKind,
    pub item: ChangedItem,
}

/// A subscriber callback. Boxed so the bus can hold a heterogeneous list of
/// closures and trait-object subscribers alike.
pub type Subscriber = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Per-store list of subscribers, invoked synchronously in registration
/// order on every publish. A subscriber that panics is caught and logged;
/// it does not stop the remaining subscribers from being invoked.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Subscriber) {
        self.subscribers.lock().expect("event bus lock poisoned").push(subscriber);
    }

    /// Deliver `event` to every subscriber, in the order they subscribed.
    /// By the time this returns, all subscribers have been invoked (§5).
    pub fn publish(&self, event: ChangeEvent) {
        let subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        for subscriber in subscribers.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| subscriber(&event)));
            if result.is_err() {
                tracing::warn!(kind = ?event.kind, "event subscriber panicked; continuing");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.subscribers.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("EventBus").field("subscriber_count", &count).finish()
    }
}
