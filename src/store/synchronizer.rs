//! Synchronizer (§4.4): pulls folder message listings from the remote into
//! the local cache, and purges cached messages past an age threshold.

use crate::error::{MailCacheError, Result};
use crate::localstorage::layout;
use crate::mode::Mode;
use crate::store::folder::{FolderHandle, OpenState};
use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_epoch_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Pull the remote folder's message listing into the local cache. Refuses
/// under OFFLINE; records start/end time and synced count in the folder's
/// `SyncStatus` regardless of outcome.
pub fn synchronize(store: Arc<crate::store::store::Store>, folder_path: &str) -> Result<u64> {
    if store.mode() == Mode::Offline {
        return Err(MailCacheError::ModeViolation { mode: Mode::Offline.name(), operation: "synchronize" });
    }
    let span = tracing::info_span!("synchronize", folder = folder_path);
    let _enter = span.enter();

    store.update_sync_status(folder_path, |status| {
        status.start_epoch_millis = Some(now_epoch_millis());
        status.success = false;
    });

    let result = run_synchronize(store.clone(), folder_path);

    store.update_sync_status(folder_path, |status| {
        status.end_epoch_millis = Some(now_epoch_millis());
        match &result {
            Ok(count) => {
                status.success = true;
                status.synced_count = *count;
                status.last_error = None;
            }
            Err(e) => {
                status.success = false;
                status.last_error = Some(e.to_string());
            }
        }
    });

    if let Ok(count) = &result {
        tracing::info!(synced = count, "synchronize completed");
    }
    result
}

fn run_synchronize(store: Arc<crate::store::store::Store>, folder_path: &str) -> Result<u64> {
    let handle = FolderHandle::open(store.clone(), folder_path, OpenState::ReadOnly)?;
    let remote_guard = handle.remote.lock().expect("remote lock poisoned");
    let Some(remote) = remote_guard.as_ref() else {
        drop(remote_guard);
        handle.close(false)?;
        return Err(MailCacheError::remote_msg("no remote client configured"));
    };
    let summaries = remote.list_summaries().map_err(MailCacheError::remote)?;
    drop(remote_guard);

    let mut synced = 0u64;
    for summary in summaries {
        if store.mode() == Mode::Offline {
            handle.close(false)?;
            return Err(MailCacheError::Cancelled);
        }
        let already_cached = handle.get(&summary.remote_id.0).is_ok();
        if already_cached {
            continue;
        }
        let remote_guard = handle.remote.lock().expect("remote lock poisoned");
        let content = remote_guard.as_ref().unwrap().fetch(&summary.remote_id).map_err(MailCacheError::remote)?;
        drop(remote_guard);
        handle.append(vec![crate::store::Message {
            id: content
                .summary
                .envelope
                .message_id
                .clone()
                .map(crate::message_id::MessageId::new)
                .unwrap_or_else(crate::message_id::generate_message_id),
            dir_name: String::new(),
            envelope: content.summary.envelope.clone(),
            flags: content.summary.flags.iter().cloned().collect(),
            body_plain: content.body_plain.clone(),
            body_html: content.body_html.clone(),
            attachments: content.attachments.clone(),
            raw: Some(content.raw.clone()),
        }])?;
        synced += 1;
    }
    handle.close(false)?;
    Ok(synced)
}

/// `purgeOlderThan(folder, days, preserveFlagged)`: archives every cached
/// message with `sentDate < now - days` and (not flagged, or
/// `preserveFlagged=false`). Returns the count archived. `days <= 0`
/// archives nothing.
pub fn purge_older_than(store: &crate::store::store::Store, folder_path: &str, days: i64, preserve_flagged: bool) -> Result<u64> {
    if days <= 0 {
        return Ok(0);
    }
    let cutoff_secs = (now_epoch_millis() / 1000) as i64 - days * 86_400;
    let messages_dir = store.layout().messages_dir(folder_path);
    if !messages_dir.is_dir() {
        return Ok(0);
    }
    let mut archived = 0u64;
    for entry in fs::read_dir(&messages_dir).map_err(|e| MailCacheError::io(&messages_dir, e))? {
        let entry = entry.map_err(|e| MailCacheError::io(&messages_dir, e))?;
        let path = entry.path();
        let message = match read_headers_only(store, &path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let sent = message.sent_epoch_secs().unwrap_or(i64::MAX);
        if sent >= cutoff_secs {
            continue;
        }
        if preserve_flagged && message.is_flagged() {
            continue;
        }
        let dir_name = path.file_name().unwrap().to_string_lossy().to_string();
        let destination = store.layout().archive_destination(&dir_name, now_epoch_millis() + archived as u128);
        layout::move_dir(&path, &destination)?;
        archived += 1;
    }
    Ok(archived)
}

/// Read just a message's envelope and flags, skipping body/attachments —
/// used by [`purge_older_than`], which only needs `sent_epoch_secs`/
/// `is_flagged`. Parses the full envelope via the same
/// [`crate::store::message_repo::parse_envelope_headers`] that `get`/`search`
/// use, so `From`/`To`/`Cc`/`Subject` are never silently dropped here either.
/// Falls back to the message-dir name's `YYYY-MM-DD_HH-MM` prefix for the
/// sent date only when the message has no `Date` header at all.
fn read_headers_only(store: &crate::store::store::Store, message_dir: &std::path::Path) -> Result<crate::store::Message> {
    let headers_path = store.layout().headers_file(message_dir);
    let headers_raw = fs::read_to_string(&headers_path).map_err(|e| MailCacheError::io(&headers_path, e))?;
    let dir_name = message_dir.file_name().unwrap_or_default().to_string_lossy().to_string();
    let mut envelope = crate::store::message_repo::parse_envelope_headers(&headers_raw);
    if envelope.date.is_none() {
        if let Some(parsed) = parse_dir_name_date(&dir_name) {
            envelope.date = Some(crate::store::DateTime { timestamp: parsed, tz_offset_secs: None });
        }
    }
    let message_id = envelope.message_id.clone().unwrap_or_default();
    let flags_path = store.layout().flags_file(message_dir);
    let flags = fs::read_to_string(&flags_path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(crate::store::message::Flag::from_token)
        .collect();
    Ok(crate::store::Message {
        id: crate::message_id::MessageId::new(message_id),
        dir_name,
        envelope,
        flags,
        body_plain: None,
        body_html: None,
        attachments: Vec::new(),
        raw: None,
    })
}

/// Parse the leading `YYYY-MM-DD_HH-MM` of a message-dir name back into a
/// unix timestamp (UTC), for purge's age comparison.
fn parse_dir_name_date(dir_name: &str) -> Option<i64> {
    let mut parts = dir_name.splitn(3, '_');
    let date = parts.next()?;
    let time = parts.next()?;
    let mut date_parts = date.split('-');
    let year: i32 = date_parts.next()?.parse().ok()?;
    let month: u32 = date_parts.next()?.parse().ok()?;
    let day: u32 = date_parts.next()?.parse().ok()?;
    let mut time_parts = time.split('-');
    let hour: u32 = time_parts.next()?.parse().ok()?;
    let minute: u32 = time_parts.next()?.parse().ok()?;

    let naive_date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    let naive_time = chrono::NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(naive_date.and_time(naive_time).and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::folder;
    use crate::store::store::Store;
    use tempfile::tempdir;

    #[test]
    fn synchronize_refuses_offline() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Offline));
        let result = synchronize(store, "INBOX");
        assert!(matches!(result, Err(MailCacheError::ModeViolation { .. })));
    }

    #[test]
    fn purge_zero_days_archives_nothing() {
        let dir = tempdir().unwrap();
        let store = Store::new("user@host", dir.path(), Mode::Online);
        folder::create(&store, "INBOX").unwrap();
        assert_eq!(purge_older_than(&store, "INBOX", 0, true).unwrap(), 0);
    }

    #[test]
    fn dir_name_date_roundtrips() {
        let name = crate::localstorage::name_format::format_message_dir_name(Some(1_700_000_000), Some("hi"), 1_700_000_000_000);
        let parsed = parse_dir_name_date(&name).unwrap();
        assert_eq!(parsed, 1_700_000_000 - (1_700_000_000 % 60));
    }
}
