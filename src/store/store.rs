//! `Store`: one account's mode, cache layout, remote client, and event bus
//! (§3). Folders are value handles that reference a `Store` rather than
//! owning it, avoiding a cyclic folder/store ownership graph (§9).

use crate::error::{MailCacheError, Result};
use crate::events::{ChangeEvent, ChangedItem, EventBus, EventKind};
use crate::localstorage::Layout;
use crate::mode::{Mode, ModeGate};
use crate::store::imap_client::ImapClient;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Ephemeral per-folder synchronization status (§3). Not persisted across
/// process restarts.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    pub start_epoch_millis: Option<u128>,
    pub end_epoch_millis: Option<u128>,
    pub success: bool,
    pub synced_count: u64,
    pub last_error: Option<String>,
}

/// One account's store: cache root, current mode, optional remote client,
/// and the bookkeeping every folder handle and repository operation shares.
pub struct Store {
    pub(crate) account_id: String,
    pub(crate) layout: Layout,
    pub(crate) mode: ModeGate,
    pub(crate) remote: Mutex<Option<Box<dyn ImapClient>>>,
    pub(crate) events: EventBus,
    pub(crate) sync_status: Mutex<HashMap<String, SyncStatus>>,
    /// Folder paths currently owned by an open `FolderHandle`, enforcing
    /// at-most-one-handle-per-folder (§5).
    pub(crate) open_folders: Mutex<HashSet<String>>,
    /// Stored but never enforced (spec.md §9 Open Questions): a soft byte
    /// cap an embedding application may surface to the user.
    pub(crate) max_cache_size_bytes: Option<u64>,
    /// Stored but never consulted by any read or write path (spec.md §9
    /// Open Questions).
    pub(crate) compress_messages: bool,
}

impl Store {
    pub fn new(account_id: impl Into<String>, cache_root: impl Into<std::path::PathBuf>, initial_mode: Mode) -> Self {
        Self {
            account_id: account_id.into(),
            layout: Layout::new(cache_root),
            mode: ModeGate::new(initial_mode),
            remote: Mutex::new(None),
            events: EventBus::new(),
            sync_status: Mutex::new(HashMap::new()),
            open_folders: Mutex::new(HashSet::new()),
            max_cache_size_bytes: None,
            compress_messages: false,
        }
    }

    pub fn with_remote(mut self, remote: Box<dyn ImapClient>) -> Self {
        self.remote = Mutex::new(Some(remote));
        self
    }

    /// Plumb the two stored-but-unenforced config knobs through to this
    /// store, so `CacheManager::configured_max_size` can surface them.
    pub fn with_config(mut self, config: &crate::config::Config) -> Self {
        self.max_cache_size_bytes = config.max_cache_size_bytes;
        self.compress_messages = config.compress_messages;
        self
    }

    pub fn max_cache_size_bytes(&self) -> Option<u64> {
        self.max_cache_size_bytes
    }

    pub fn compress_messages(&self) -> bool {
        self.compress_messages
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn mode(&self) -> Mode {
        self.mode.current()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Switch this store's mode. Switching to `Offline` drops (disconnects)
    /// any open remote client handle, per §4.1.
    pub fn set_mode(&self, new_mode: Mode) {
        let previous = self.mode.set_mode(new_mode);
        if new_mode == Mode::Offline {
            if let Some(remote) = self.remote.lock().expect("remote lock poisoned").take() {
                remote.disconnect();
            }
        }
        if previous != new_mode {
            self.events.publish(ChangeEvent {
                source_account_id: self.account_id.clone(),
                kind: EventKind::CacheModeChanged,
                item: ChangedItem::Account(self.account_id.clone()),
            });
        }
    }

    /// Close the store: disconnects the remote client and emits
    /// `STORE_CLOSED`. Any handles referencing this store become unusable
    /// for further folder opens.
    pub fn close(&self) {
        if let Some(remote) = self.remote.lock().expect("remote lock poisoned").take() {
            remote.disconnect();
        }
        self.events.publish(ChangeEvent {
            source_account_id: self.account_id.clone(),
            kind: EventKind::StoreClosed,
            item: ChangedItem::Account(self.account_id.clone()),
        });
    }

    pub(crate) fn publish(&self, kind: EventKind, item: ChangedItem) {
        self.events.publish(ChangeEvent { source_account_id: self.account_id.clone(), kind, item });
    }

    pub(crate) fn mark_folder_open(&self, folder_path: &str) -> Result<()> {
        let mut open = self.open_folders.lock().expect("open-folders lock poisoned");
        if !open.insert(folder_path.to_string()) {
            return Err(MailCacheError::InvalidState(format!("folder already open: {folder_path}")));
        }
        Ok(())
    }

    pub(crate) fn mark_folder_closed(&self, folder_path: &str) {
        self.open_folders.lock().expect("open-folders lock poisoned").remove(folder_path);
    }

    pub fn sync_status(&self, folder_path: &str) -> SyncStatus {
        self.sync_status
            .lock()
            .expect("sync status lock poisoned")
            .entry(folder_path.to_string())
            .or_default()
            .clone()
    }

    pub(crate) fn update_sync_status(&self, folder_path: &str, f: impl FnOnce(&mut SyncStatus)) {
        let mut guard = self.sync_status.lock().expect("sync status lock poisoned");
        let status = guard.entry(folder_path.to_string()).or_default();
        f(status);
    }
}
