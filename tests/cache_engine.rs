//! End-to-end exercises of the mode-gated cache engine against a mock IMAP
//! client, covering the concrete scenarios called out for the engine:
//! offline reads, ACCELERATED-vs-ONLINE append divergence on remote
//! failure, a synchronize pass, and a DESTRUCTIVE delete.

use mailcache_core::events::{ChangedItem, EventKind};
use mailcache_core::mode::Mode;
use mailcache_core::store::folder::{self, FolderHandle, OpenState};
use mailcache_core::store::imap_client::{
    ImapClient, RemoteError, RemoteFolder, RemoteFolderInfo, RemoteMessageContent, RemoteMessageId,
    RemoteMessageSummary, RemoteOpenMode,
};
use mailcache_core::store::store::Store;
use mailcache_core::store::{Envelope, Message};
use std::collections::HashSet;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// A fake remote mailbox: a fixed set of messages, with append optionally
/// forced to fail so tests can exercise the mode-specific fallback policy.
struct MockRemoteFolder {
    messages: Mutex<Vec<(RemoteMessageId, Vec<u8>, Option<String>)>>,
    fail_append: Arc<AtomicBool>,
    append_count: Arc<AtomicU64>,
    next_id: AtomicU64,
}

impl RemoteFolder for MockRemoteFolder {
    fn list_summaries(&self) -> Result<Vec<RemoteMessageSummary>, RemoteError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, subject)| RemoteMessageSummary {
                remote_id: id.clone(),
                envelope: Envelope { subject: subject.clone(), ..Default::default() },
                flags: vec![],
                size: 0,
            })
            .collect())
    }

    fn fetch(&self, remote_id: &RemoteMessageId) -> Result<RemoteMessageContent, RemoteError> {
        let messages = self.messages.lock().unwrap();
        let (id, raw, subject) = messages
            .iter()
            .find(|(id, _, _)| id == remote_id)
            .ok_or_else(|| RemoteError::new("no such message"))?;
        Ok(RemoteMessageContent::new(
            RemoteMessageSummary {
                remote_id: id.clone(),
                envelope: Envelope { subject: subject.clone(), ..Default::default() },
                flags: vec![],
                size: raw.len() as u64,
            },
            raw.clone(),
        ))
    }

    fn append(&self, raw: &[u8]) -> Result<RemoteMessageId, RemoteError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(RemoteError::new("simulated remote failure"));
        }
        self.append_count.fetch_add(1, Ordering::SeqCst);
        let id = RemoteMessageId(format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.messages.lock().unwrap().push((id.clone(), raw.to_vec(), None));
        Ok(id)
    }

    fn set_flags(&self, _remote_id: &RemoteMessageId, _flags: &[mailcache_core::store::Flag], _value: bool) -> Result<(), RemoteError> {
        Ok(())
    }

    fn expunge(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    fn close(&self) {}
}

/// A fake account: one named folder backed by [`MockRemoteFolder`].
struct MockImapClient {
    folder: Arc<MockRemoteFolder>,
    fail_append: Arc<AtomicBool>,
    append_count: Arc<AtomicU64>,
}

impl MockImapClient {
    fn new() -> Self {
        let fail_append = Arc::new(AtomicBool::new(false));
        let append_count = Arc::new(AtomicU64::new(0));
        Self {
            folder: Arc::new(MockRemoteFolder {
                messages: Mutex::new(Vec::new()),
                fail_append: fail_append.clone(),
                append_count: append_count.clone(),
                next_id: AtomicU64::new(0),
            }),
            fail_append,
            append_count,
        }
    }

    fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    fn append_count(&self) -> u64 {
        self.append_count.load(Ordering::SeqCst)
    }
}

impl ImapClient for MockImapClient {
    fn list_children(&self, _parent: &str) -> Result<Vec<RemoteFolderInfo>, RemoteError> {
        Ok(vec![RemoteFolderInfo { name: "INBOX".into() }])
    }

    fn folder_exists(&self, name: &str) -> Result<bool, RemoteError> {
        Ok(name.eq_ignore_ascii_case("INBOX"))
    }

    fn open_folder(&self, name: &str, _mode: RemoteOpenMode) -> Result<Box<dyn RemoteFolder>, RemoteError> {
        if !name.eq_ignore_ascii_case("INBOX") {
            return Err(RemoteError::new("no such folder"));
        }
        Ok(Box::new(SharedMockFolder(self.folder.clone())))
    }

    fn create_folder(&self, _name: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    fn rename_folder(&self, _old_name: &str, _new_name: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    fn delete_folder(&self, _name: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    fn disconnect(&self) {}
}

/// Thin wrapper so each `open_folder` call can hand out a fresh
/// `Box<dyn RemoteFolder>` backed by the same underlying mailbox.
struct SharedMockFolder(Arc<MockRemoteFolder>);

impl RemoteFolder for SharedMockFolder {
    fn list_summaries(&self) -> Result<Vec<RemoteMessageSummary>, RemoteError> {
        self.0.list_summaries()
    }
    fn fetch(&self, remote_id: &RemoteMessageId) -> Result<RemoteMessageContent, RemoteError> {
        self.0.fetch(remote_id)
    }
    fn append(&self, raw: &[u8]) -> Result<RemoteMessageId, RemoteError> {
        self.0.append(raw)
    }
    fn set_flags(&self, remote_id: &RemoteMessageId, flags: &[mailcache_core::store::Flag], value: bool) -> Result<(), RemoteError> {
        self.0.set_flags(remote_id, flags, value)
    }
    fn expunge(&self) -> Result<(), RemoteError> {
        self.0.expunge()
    }
    fn close(&self) {}
}

static TRACING_INIT: Once = Once::new();

/// Install an `env-filter`-driven subscriber once so `RUST_LOG=debug cargo
/// test -- --nocapture` surfaces the mode-gate and sync spans/events these
/// scenarios exercise.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
    });
}

fn sample_message(subject: &str, message_id: Option<&str>) -> Message {
    Message {
        id: mailcache_core::message_id::MessageId::new(message_id.unwrap_or("")),
        dir_name: String::new(),
        envelope: Envelope {
            subject: Some(subject.to_string()),
            message_id: message_id.map(|s| s.to_string()),
            from: vec![mailcache_core::store::Address {
                display_name: Some("Alice Example".into()),
                local_part: "alice".into(),
                domain: Some("example.com".into()),
            }],
            date: Some(mailcache_core::store::DateTime { timestamp: 1_700_000_000, tz_offset_secs: Some(-18_000) }),
            ..Default::default()
        },
        flags: HashSet::new(),
        body_plain: Some("hello world".into()),
        body_html: None,
        attachments: Vec::new(),
        raw: Some(b"Subject: hi\n\nhello world".to_vec()),
    }
}

#[test]
fn offline_store_serves_cache_and_rejects_append() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated));
    folder::create(&store, "INBOX").unwrap();
    {
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        handle.append(vec![sample_message("cached before offline", None)]).unwrap();
    }
    store.set_mode(Mode::Offline);
    let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadOnly).unwrap();
    let found = handle.search(&mailcache_core::store::SearchCriteria::SubjectContains("cached".into())).unwrap();
    assert_eq!(found.len(), 1);
    let append_result = handle.append(vec![sample_message("new", None)]);
    assert!(matches!(append_result, Err(mailcache_core::error::MailCacheError::ModeViolation { .. })));
}

#[test]
fn accelerated_append_survives_remote_failure() {
    init_tracing();
    let dir = tempdir().unwrap();
    let remote = MockImapClient::new();
    remote.set_fail_append(true);
    let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated).with_remote(Box::new(remote)));
    folder::create(&store, "INBOX").unwrap();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let delivered2 = delivered.clone();
    store.events().subscribe(Box::new(move |event| {
        if event.kind == EventKind::FolderUpdated {
            if let ChangedItem::Folder { folder_path } = &event.item {
                delivered2.lock().unwrap().push(folder_path.clone());
            }
        }
    }));

    let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
    let appended = handle.append(vec![sample_message("accelerated", None)]).unwrap();
    assert_eq!(appended.len(), 1);
    assert_eq!(delivered.lock().unwrap().len(), 1);

    let cached = handle.get(appended[0].id.as_str()).unwrap();
    assert_eq!(cached.envelope.subject.as_deref(), Some("accelerated"));
}

#[test]
fn online_append_fails_and_leaves_no_local_trace() {
    init_tracing();
    let dir = tempdir().unwrap();
    let remote = MockImapClient::new();
    remote.set_fail_append(true);
    let store = Arc::new(Store::new("user@host", dir.path(), Mode::Online).with_remote(Box::new(remote)));
    folder::create(&store, "INBOX").unwrap();

    let delivered = Arc::new(Mutex::new(0u32));
    let delivered2 = delivered.clone();
    store.events().subscribe(Box::new(move |event| {
        if event.kind == EventKind::FolderUpdated {
            *delivered2.lock().unwrap() += 1;
        }
    }));

    let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
    let result = handle.append(vec![sample_message("online", None)]);
    assert!(matches!(result, Err(mailcache_core::error::MailCacheError::RemoteUnavailable(_))));
    assert_eq!(*delivered.lock().unwrap(), 0);
    let messages_dir = store.layout().messages_dir("INBOX");
    let remaining = std::fs::read_dir(&messages_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(remaining, 0);
}

#[test]
fn synchronize_pulls_remote_messages_into_cache() {
    init_tracing();
    let dir = tempdir().unwrap();
    let remote = MockImapClient::new();
    for i in 0..3 {
        remote.folder.append(format!("Subject: m{i}\n\nbody {i}").as_bytes()).unwrap();
    }
    let append_count_before = remote.append_count();
    let store = Arc::new(Store::new("user@host", dir.path(), Mode::Refresh).with_remote(Box::new(remote)));
    folder::create(&store, "INBOX").unwrap();

    let synced = mailcache_core::store::synchronizer::synchronize(store.clone(), "INBOX").unwrap();
    assert_eq!(synced, 3);
    let status = store.sync_status("INBOX");
    assert!(status.success);
    assert_eq!(status.synced_count, 3);
    assert_eq!(append_count_before, 3);
}

#[test]
fn destructive_delete_archives_message_and_emits_event() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = Arc::new(Store::new("user@host", dir.path(), Mode::Destructive));
    folder::create(&store, "INBOX").unwrap();

    let removed = Arc::new(Mutex::new(false));
    let removed2 = removed.clone();
    store.events().subscribe(Box::new(move |event| {
        if event.kind == EventKind::MessageRemoved {
            *removed2.lock().unwrap() = true;
        }
    }));

    let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
    let appended = handle.append(vec![sample_message("to delete", None)]).unwrap();
    handle.delete(appended[0].id.as_str()).unwrap();

    assert!(*removed.lock().unwrap());
    assert!(handle.get(appended[0].id.as_str()).is_err());
    assert!(store.layout().archive_root().is_dir());
}

#[test]
fn append_close_reopen_get_round_trip() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated));
    folder::create(&store, "INBOX").unwrap();
    let message_id = "<specific@example.com>";
    {
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        handle.append(vec![sample_message("round trip", Some(message_id))]).unwrap();
    }
    let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadOnly).unwrap();
    let fetched = handle.get(message_id).unwrap();
    assert_eq!(fetched.envelope.subject.as_deref(), Some("round trip"));
    assert_eq!(fetched.envelope.message_id.as_deref(), Some(message_id));
    assert_eq!(fetched.envelope.from.len(), 1);
    assert_eq!(fetched.envelope.from[0].local_part, "alice");
    assert_eq!(fetched.envelope.from[0].domain.as_deref(), Some("example.com"));
    assert_eq!(fetched.envelope.date.map(|d| d.timestamp), Some(1_700_000_000));
    assert_eq!(fetched.envelope.date.and_then(|d| d.tz_offset_secs), Some(-18_000));
}
