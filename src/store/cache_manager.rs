//! Cache manager / maintenance (§4.6): statistics, full and per-folder
//! clears, and sync-status lookup.

use crate::error::Result;
use crate::localstorage::layout;
use crate::store::store::{Store, SyncStatus};
use std::fs;

/// Total byte size, folder count, and message count under one store's
/// cache root, computed by walking the tree. O(files).
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStatistics {
    pub total_bytes: u64,
    pub folder_count: u64,
    pub message_count: u64,
}

/// `getStatistics()`.
pub fn statistics(store: &Store) -> Result<CacheStatistics> {
    let root = store.layout().root();
    if !root.is_dir() {
        return Ok(CacheStatistics::default());
    }
    let mut stats = CacheStatistics::default();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut has_messages_subtree = false;
        for entry in fs::read_dir(&dir).map_err(|e| crate::error::MailCacheError::io(&dir, e))? {
            let entry = entry.map_err(|e| crate::error::MailCacheError::io(&dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if name == layout::ARCHIVE_DIR && dir == root {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if name == layout::MESSAGES_DIR {
                    has_messages_subtree = true;
                    let (bytes, _) = layout::walk_size(&path)?;
                    stats.total_bytes += bytes;
                    stats.message_count += count_message_dirs(&path)?;
                } else {
                    stack.push(path);
                }
            }
        }
        if has_messages_subtree && dir != *root {
            stats.folder_count += 1;
        }
    }
    Ok(stats)
}

fn count_message_dirs(messages_dir: &std::path::Path) -> Result<u64> {
    let mut count = 0u64;
    for entry in fs::read_dir(messages_dir).map_err(|e| crate::error::MailCacheError::io(messages_dir, e))? {
        let entry = entry.map_err(|e| crate::error::MailCacheError::io(messages_dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            count += 1;
        }
    }
    Ok(count)
}

/// `clearCache(folder)`: removes a folder subtree. Delete-gated.
pub fn clear_folder(store: &Store, folder_path: &str) -> Result<()> {
    store.mode.require_delete("clear_cache_folder", |_| {
        let dir = store.layout().folder_dir(folder_path);
        if dir.is_dir() {
            fs::remove_dir_all(&dir).map_err(|e| crate::error::MailCacheError::io(&dir, e))?;
        }
        Ok(())
    })
}

/// `clearCache()`: removes everything under `<root>` except `archive/`.
/// Delete-gated.
pub fn clear_all(store: &Store) -> Result<()> {
    store.mode.require_delete("clear_cache", |_| {
        let root = store.layout().root();
        if !root.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(root).map_err(|e| crate::error::MailCacheError::io(root, e))? {
            let entry = entry.map_err(|e| crate::error::MailCacheError::io(root, e))?;
            if entry.file_name() == layout::ARCHIVE_DIR {
                continue;
            }
            let path = entry.path();
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                fs::remove_dir_all(&path).map_err(|e| crate::error::MailCacheError::io(&path, e))?;
            } else {
                fs::remove_file(&path).map_err(|e| crate::error::MailCacheError::io(&path, e))?;
            }
        }
        Ok(())
    })
}

/// `getSyncStatus(folder)`: returns (and lazily creates) an ephemeral
/// status record.
pub fn sync_status(store: &Store, folder_path: &str) -> SyncStatus {
    store.sync_status(folder_path)
}

/// The configured soft byte cap on total cache size, if any (spec.md §9
/// Open Questions: stored for inspection, never enforced by this crate).
pub fn configured_max_size(store: &Store) -> Option<u64> {
    store.max_cache_size_bytes()
}
