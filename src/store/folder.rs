//! Folder repository (§4.2) and the per-folder open state machine (§5).
//!
//! Folder repository operations (`exists`/`list`/`create`/`rename`/`delete`)
//! take a `&Store` directly — they need no open handle. Message operations
//! need to know whether a remote folder is currently open, so they live on
//! `FolderHandle`, a value handle referencing its store rather than owning
//! it (§9).

use crate::error::{MailCacheError, Result};
use crate::events::{ChangedItem, EventKind};
use crate::localstorage::layout;
use crate::store::imap_client::{RemoteFolder, RemoteOpenMode};
use crate::store::store::Store;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata describing one folder, returned by `list`.
#[derive(Debug, Clone)]
pub struct FolderInfo {
    pub name: String,
}

/// Current open state of a `FolderHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Closed,
    ReadOnly,
    ReadWrite,
}

fn now_epoch_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// `exists(name)`: true if the local directory exists, or — in a server-read
/// mode — the remote folder exists (materializing the local directory as a
/// side effect of that check).
pub fn exists(store: &Store, name: &str) -> Result<bool> {
    let dir = store.layout().folder_dir(name);
    if dir.is_dir() {
        return Ok(true);
    }
    store.mode.with_mode(|mode| {
        if !mode.reads_from_server() && !mode.reads_fall_back_to_server() {
            return Ok(false);
        }
        let remote_guard = store.remote.lock().expect("remote lock poisoned");
        let Some(remote) = remote_guard.as_ref() else { return Ok(false) };
        match remote.folder_exists(name) {
            Ok(true) => {
                layout::ensure_dir(&dir)?;
                layout::ensure_dir(&store.layout().messages_dir(name))?;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => Err(MailCacheError::remote(e)),
        }
    })
}

/// `list(parent)`: union of local subdirectories and, in server-read modes,
/// remote children, deduplicated by name.
pub fn list(store: &Store, parent: &str) -> Result<Vec<FolderInfo>> {
    let mut names = std::collections::BTreeSet::new();
    let parent_dir = store.layout().folder_dir(parent);
    if parent_dir.is_dir() {
        for entry in fs::read_dir(&parent_dir).map_err(|e| MailCacheError::io(&parent_dir, e))? {
            let entry = entry.map_err(|e| MailCacheError::io(&parent_dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name == layout::MESSAGES_DIR || name == layout::ARCHIVE_DIR {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                names.insert(name);
            }
        }
    }
    store.mode.with_mode(|mode| {
        if mode.searches_on_server() || mode.reads_from_server() {
            let remote_guard = store.remote.lock().expect("remote lock poisoned");
            if let Some(remote) = remote_guard.as_ref() {
                match remote.list_children(parent) {
                    Ok(children) => {
                        for child in children {
                            names.insert(child.name);
                        }
                    }
                    Err(e) => return Err(MailCacheError::remote(e)),
                }
            }
        }
        Ok(())
    })?;
    Ok(names.into_iter().map(|name| FolderInfo { name }).collect())
}

/// `create(name)`: server-first with the ACCELERATED fallback rule (§4.2).
pub fn create(store: &Store, name: &str) -> Result<()> {
    store.mode.require_write("create_folder", |mode| {
        let remote_result = {
            let remote_guard = store.remote.lock().expect("remote lock poisoned");
            remote_guard.as_ref().map(|remote| remote.create_folder(name))
        };
        match remote_result {
            Some(Err(e)) if mode.relaxes_server_first_on_write_failure() => {
                tracing::warn!(folder = name, error = %e, "remote create_folder failed; creating locally anyway");
            }
            Some(Err(e)) => return Err(MailCacheError::remote(e)),
            Some(Ok(())) | None => {}
        }
        layout::ensure_dir(&store.layout().folder_dir(name))?;
        layout::ensure_dir(&store.layout().messages_dir(name))?;
        store.publish(EventKind::FolderAdded, ChangedItem::Folder { folder_path: name.to_string() });
        Ok(())
    })
}

/// `rename(oldName, newName)`: write-gated, same server-first/ACCELERATED
/// fallback rule as `create`.
pub fn rename(store: &Store, old_name: &str, new_name: &str) -> Result<()> {
    store.mode.require_write("rename_folder", |mode| {
        let remote_result = {
            let remote_guard = store.remote.lock().expect("remote lock poisoned");
            remote_guard.as_ref().map(|remote| remote.rename_folder(old_name, new_name))
        };
        match remote_result {
            Some(Err(e)) if mode.relaxes_server_first_on_write_failure() => {
                tracing::warn!(old_name, new_name, error = %e, "remote rename_folder failed; renaming locally anyway");
            }
            Some(Err(e)) => return Err(MailCacheError::remote(e)),
            Some(Ok(())) | None => {}
        }
        let old_dir = store.layout().folder_dir(old_name);
        let new_dir = store.layout().folder_dir(new_name);
        if old_dir.is_dir() {
            if let Some(parent) = new_dir.parent() {
                layout::ensure_dir(parent)?;
            }
            fs::rename(&old_dir, &new_dir).map_err(|e| MailCacheError::io(&old_dir, e))?;
        }
        store.publish(EventKind::FolderUpdated, ChangedItem::Folder { folder_path: new_name.to_string() });
        Ok(())
    })
}

/// `delete(name)`: delete-gated archival move under `archive/<timestamp>/<name>`,
/// followed by a remote delete request. If archival fails the remote delete
/// must not be issued (§4.2).
pub fn delete(store: &Store, name: &str) -> Result<()> {
    store.mode.require_delete("delete_folder", |_mode| {
        let dir = store.layout().folder_dir(name);
        if dir.is_dir() {
            let destination = store.layout().archive_destination(name, now_epoch_millis());
            layout::move_dir(&dir, &destination)?;
        }
        let remote_guard = store.remote.lock().expect("remote lock poisoned");
        if let Some(remote) = remote_guard.as_ref() {
            remote.delete_folder(name).map_err(MailCacheError::remote)?;
        }
        drop(remote_guard);
        store.publish(EventKind::FolderRemoved, ChangedItem::Folder { folder_path: name.to_string() });
        Ok(())
    })
}

/// A value handle onto one folder of a `Store`. Enforces the
/// `Closed -> ReadOnly -> Closed` / `Closed -> ReadWrite -> Closed` state
/// machine and, while open, owns the remote folder handle (if any) that
/// message-repository operations consult.
pub struct FolderHandle {
    pub(crate) store: Arc<Store>,
    pub(crate) folder_path: String,
    pub(crate) state: Mutex<OpenState>,
    pub(crate) remote: Mutex<Option<Box<dyn RemoteFolder>>>,
}

impl FolderHandle {
    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn state(&self) -> OpenState {
        *self.state.lock().expect("folder state lock poisoned")
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Open a handle onto `folder_path`. Fails if another handle already
    /// owns this folder within the same store.
    pub fn open(store: Arc<Store>, folder_path: impl Into<String>, mode: OpenState) -> Result<Self> {
        if mode == OpenState::Closed {
            return Err(MailCacheError::InvalidState("cannot open a folder in state Closed".into()));
        }
        let folder_path = folder_path.into();
        store.mark_folder_open(&folder_path)?;
        let remote = store.mode.with_mode(|current| {
            if !current.reads_from_server() && !current.reads_fall_back_to_server() && !current.searches_on_server() {
                return Ok(None);
            }
            let remote_client = store.remote.lock().expect("remote lock poisoned");
            let Some(client) = remote_client.as_ref() else { return Ok(None) };
            let remote_mode = if mode == OpenState::ReadWrite { RemoteOpenMode::ReadWrite } else { RemoteOpenMode::ReadOnly };
            match client.open_folder(&folder_path, remote_mode) {
                Ok(handle) => Ok(Some(handle)),
                Err(e) => Err(MailCacheError::remote(e)),
            }
        });
        let remote = match remote {
            Ok(r) => r,
            Err(e) => {
                store.mark_folder_closed(&folder_path);
                return Err(e);
            }
        };
        Ok(Self { store, folder_path, state: Mutex::new(mode), remote: Mutex::new(remote) })
    }

    /// Close the handle. `expunge=true` is rejected unless the store's mode
    /// is DESTRUCTIVE; otherwise treated as close-without-expunge (§4.2).
    pub fn close(&self, expunge: bool) -> Result<()> {
        let mut state = self.state.lock().expect("folder state lock poisoned");
        if *state == OpenState::Closed {
            return Ok(());
        }
        if expunge {
            self.store.mode.require_delete("expunge", |_| Ok(()))?;
            if let Some(remote) = self.remote.lock().expect("remote lock poisoned").as_ref() {
                remote.expunge().map_err(MailCacheError::remote)?;
            }
        }
        if let Some(remote) = self.remote.lock().expect("remote lock poisoned").take() {
            remote.close();
        }
        *state = OpenState::Closed;
        self.store.mark_folder_closed(&self.folder_path);
        Ok(())
    }
}

impl Drop for FolderHandle {
    fn drop(&mut self) {
        if self.state() != OpenState::Closed {
            let _ = self.close(false);
        }
    }
}
