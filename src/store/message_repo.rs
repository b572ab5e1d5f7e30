//! Message repository (§4.3): get/search/append/setFlags/delete/move,
//! implemented on an open [`FolderHandle`] since several operations need to
//! know whether a remote folder handle is currently open.

use crate::error::{MailCacheError, Result};
use crate::events::{ChangedItem, EventKind};
use crate::localstorage::layout;
use crate::message_id::generate_message_id;
use crate::mode::Mode;
use crate::store::folder::FolderHandle;
use crate::store::imap_client::{RemoteMessageContent, RemoteMessageId};
use crate::store::message::{Address, DateTime, Envelope, Flag, Message};
use crate::store::search::SearchCriteria;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_epoch_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Render an envelope's headers into `headers.properties`'s wire format
/// (§6: `Name: Value` per line, multi-valued headers repeat the key). Every
/// envelope field round-trips through [`parse_envelope_headers`].
pub(crate) fn format_envelope_headers(message_id: &crate::message_id::MessageId, envelope: &Envelope) -> String {
    let mut headers = String::new();
    headers.push_str(&format!("Message-ID: {}\n", message_id.as_str()));
    if let Some(subject) = &envelope.subject {
        headers.push_str(&format!("Subject: {subject}\n"));
    }
    if let Some(date) = &envelope.date {
        headers.push_str(&format!("Date: {}\n", date.to_header_value()));
    }
    for address in &envelope.from {
        headers.push_str(&format!("From: {}\n", address.to_header_value()));
    }
    for address in &envelope.to {
        headers.push_str(&format!("To: {}\n", address.to_header_value()));
    }
    for address in &envelope.cc {
        headers.push_str(&format!("Cc: {}\n", address.to_header_value()));
    }
    headers
}

/// Parse a `headers.properties` file back into an [`Envelope`], the inverse
/// of [`format_envelope_headers`]. `From`/`To`/`Cc` repeat across lines, one
/// address per line.
pub(crate) fn parse_envelope_headers(raw: &str) -> Envelope {
    let mut envelope = Envelope::default();
    for line in raw.lines() {
        let Some((name, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        match name.trim() {
            "Message-ID" => envelope.message_id = Some(value.to_string()),
            "Subject" => envelope.subject = Some(value.to_string()),
            "Date" => envelope.date = DateTime::from_header_value(value),
            "From" => envelope.from.push(Address::from_header_value(value)),
            "To" => envelope.to.push(Address::from_header_value(value)),
            "Cc" => envelope.cc.push(Address::from_header_value(value)),
            _ => {}
        }
    }
    envelope
}

impl FolderHandle {
    /// `get(key)`: `key` is either a sanitized message-id or a message
    /// directory name. Serves from cache; falls back to (or always uses)
    /// remote fetch per the current mode, caching the result on a hit.
    pub fn get(&self, key: &str) -> Result<Message> {
        if let Some(message) = self.read_cached(key)? {
            if !self.store.mode().reads_from_server() {
                return Ok(message);
            }
        }
        let mode = self.store.mode();
        if mode == Mode::Offline {
            return Err(MailCacheError::NotCached(key.to_string()));
        }
        if !mode.reads_from_server() && !mode.reads_fall_back_to_server() {
            return self.read_cached(key)?.ok_or_else(|| MailCacheError::NotCached(key.to_string()));
        }
        let remote_guard = self.remote.lock().expect("remote lock poisoned");
        let Some(remote) = remote_guard.as_ref() else {
            return self.read_cached(key)?.ok_or_else(|| MailCacheError::NotCached(key.to_string()));
        };
        let content = remote
            .fetch(&RemoteMessageId(key.to_string()))
            .map_err(MailCacheError::remote)?;
        drop(remote_guard);
        self.materialize(&content)
    }

    fn read_cached(&self, key: &str) -> Result<Option<Message>> {
        let messages_dir = self.store.layout().messages_dir(&self.folder_path);
        if !messages_dir.is_dir() {
            return Ok(None);
        }
        for entry in fs::read_dir(&messages_dir).map_err(|e| MailCacheError::io(&messages_dir, e))? {
            let entry = entry.map_err(|e| MailCacheError::io(&messages_dir, e))?;
            let dir_name = entry.file_name().to_string_lossy().to_string();
            if dir_name == key {
                return self.read_message_dir(&entry.path()).map(Some);
            }
            if let Ok(message) = self.read_message_dir(&entry.path()) {
                if message.id.as_str() == key {
                    return Ok(Some(message));
                }
            }
        }
        Ok(None)
    }

    fn read_message_dir(&self, dir: &Path) -> Result<Message> {
        let dir_name = dir.file_name().unwrap_or_default().to_string_lossy().to_string();
        let headers_path = self.store.layout().headers_file(dir);
        let headers_raw = fs::read_to_string(&headers_path).map_err(|e| MailCacheError::io(&headers_path, e))?;
        let envelope = parse_envelope_headers(&headers_raw);
        let message_id = envelope
            .message_id
            .clone()
            .ok_or_else(|| MailCacheError::InvalidState(format!("{dir:?} missing Message-ID")))?;

        let flags_path = self.store.layout().flags_file(dir);
        let flags: HashSet<Flag> = fs::read_to_string(&flags_path)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(Flag::from_token)
            .collect();

        let body_plain = fs::read_to_string(self.store.layout().content_txt_file(dir)).ok();
        let body_html = fs::read_to_string(self.store.layout().content_html_file(dir)).ok();
        let raw = fs::read(self.store.layout().raw_file(dir)).ok();

        let attachments_dir = self.store.layout().attachments_dir(dir);
        let mut attachments = Vec::new();
        if attachments_dir.is_dir() {
            for entry in fs::read_dir(&attachments_dir).map_err(|e| MailCacheError::io(&attachments_dir, e))? {
                let entry = entry.map_err(|e| MailCacheError::io(&attachments_dir, e))?;
                let path = entry.path();
                if path.is_file() {
                    let filename = entry.file_name().to_string_lossy().to_string();
                    let content = fs::read(&path).map_err(|e| MailCacheError::io(&path, e))?;
                    attachments.push(crate::store::Attachment {
                        filename,
                        mime_type: "application/octet-stream".to_string(),
                        content,
                    });
                }
            }
        }

        Ok(Message {
            id: crate::message_id::MessageId::new(message_id),
            dir_name,
            envelope,
            flags,
            body_plain,
            body_html,
            attachments,
            raw,
        })
    }

    /// Disambiguate a freshly formatted message-directory name against
    /// whatever is already on disk in this folder, per §4.5 ("if name
    /// collides, append `_<counter>`").
    fn disambiguate_dir_name(&self, base_name: &str) -> String {
        let messages_dir = self.store.layout().messages_dir(&self.folder_path);
        crate::localstorage::name_format::disambiguate(base_name, |candidate| messages_dir.join(candidate).exists())
    }

    fn materialize(&self, content: &RemoteMessageContent) -> Result<Message> {
        let message_id = content
            .summary
            .envelope
            .message_id
            .clone()
            .map(crate::message_id::MessageId::new)
            .unwrap_or_else(generate_message_id);
        let dir_name = self.disambiguate_dir_name(&crate::localstorage::name_format::format_message_dir_name(
            content.summary.envelope.date.map(|d| d.timestamp),
            content.summary.envelope.subject.as_deref(),
            now_epoch_millis(),
        ));
        let message_dir = self.store.layout().message_dir(&self.folder_path, &dir_name);
        self.write_message_dir(
            &message_dir,
            &message_id,
            &content.summary.envelope,
            &content.summary.flags,
            content.body_plain.as_deref(),
            content.body_html.as_deref(),
            &content.attachments,
            Some(&content.raw),
        )?;
        let message = self.read_message_dir(&message_dir)?;
        self.store.publish(
            EventKind::MessageAdded,
            ChangedItem::Message { folder_path: self.folder_path.clone(), message_id: message.id.as_str().to_string() },
        );
        Ok(message)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_message_dir(
        &self,
        message_dir: &Path,
        message_id: &crate::message_id::MessageId,
        envelope: &crate::store::Envelope,
        flags: &[Flag],
        body_plain: Option<&str>,
        body_html: Option<&str>,
        attachments: &[crate::store::Attachment],
        raw: Option<&[u8]>,
    ) -> Result<()> {
        let headers = format_envelope_headers(message_id, envelope);
        layout::write_atomic(&self.store.layout().headers_file(message_dir), headers.as_bytes())?;

        let flags_text = flags.iter().map(|f| f.token()).collect::<Vec<_>>().join("\n");
        layout::write_atomic(&self.store.layout().flags_file(message_dir), flags_text.as_bytes())?;

        if let Some(text) = body_plain {
            layout::write_atomic(&self.store.layout().content_txt_file(message_dir), text.as_bytes())?;
        }
        if let Some(html) = body_html {
            layout::write_atomic(&self.store.layout().content_html_file(message_dir), html.as_bytes())?;
        }
        for attachment in attachments {
            let path = self
                .store
                .layout()
                .attachments_dir(message_dir)
                .join(crate::localstorage::name_format::sanitize(&attachment.filename));
            layout::write_atomic(&path, &attachment.content)?;
        }

        if let Some(raw) = raw {
            layout::write_atomic(&self.store.layout().raw_file(message_dir), raw)?;
        }
        Ok(())
    }

    /// Enumerate cached messages, paged (§6 mail-access API: "enumerate
    /// messages, paged"). Ordering follows message-directory name, whose
    /// `YYYY-MM-DD_HH-MM` prefix makes lexical order coincide with sent
    /// order. Served entirely from the local cache regardless of mode — a
    /// full folder listing is not itself one of the four mode-gated
    /// predicates, only `get`/`search`'s per-item fetch is.
    pub fn list_messages(&self, offset: usize, limit: usize) -> Result<Vec<Message>> {
        let messages_dir = self.store.layout().messages_dir(&self.folder_path);
        if !messages_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut dir_names: Vec<String> = fs::read_dir(&messages_dir)
            .map_err(|e| MailCacheError::io(&messages_dir, e))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        dir_names.sort();
        dir_names
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|dir_name| self.read_message_dir(&messages_dir.join(dir_name)))
            .collect()
    }

    /// `search(criteria)`: executes remotely (caching returned messages)
    /// in server-search modes; otherwise scans the local cache.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Message>> {
        let mode = self.store.mode();
        if mode.searches_on_server() {
            let remote_guard = self.remote.lock().expect("remote lock poisoned");
            if let Some(remote) = remote_guard.as_ref() {
                let summaries = remote.list_summaries().map_err(MailCacheError::remote)?;
                drop(remote_guard);
                let mut out = Vec::new();
                for summary in summaries {
                    let content = {
                        let remote_guard = self.remote.lock().expect("remote lock poisoned");
                        remote_guard.as_ref().unwrap().fetch(&summary.remote_id).map_err(MailCacheError::remote)?
                    };
                    let message = self.materialize(&content)?;
                    if criteria.matches(&message) {
                        out.push(message);
                    }
                }
                return Ok(out);
            }
        }
        self.scan_local(criteria)
    }

    fn scan_local(&self, criteria: &SearchCriteria) -> Result<Vec<Message>> {
        let messages_dir = self.store.layout().messages_dir(&self.folder_path);
        if !messages_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&messages_dir).map_err(|e| MailCacheError::io(&messages_dir, e))? {
            let entry = entry.map_err(|e| MailCacheError::io(&messages_dir, e))?;
            if let Ok(message) = self.read_message_dir(&entry.path()) {
                if criteria.matches(&message) {
                    out.push(message);
                }
            }
        }
        Ok(out)
    }

    /// `append(messages)`: write-gated. Assigns a generated `Message-ID` to
    /// any message lacking one, appends remotely first (when the remote
    /// folder is open), then materializes locally per the mode's fallback
    /// policy. Messages already present in this folder (by message-id) are
    /// skipped.
    pub fn append(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        self.store.mode.require_write("append", |mode| {
            let mut appended = Vec::new();
            for mut message in messages {
                if message.envelope.message_id.is_none() {
                    let id = generate_message_id();
                    message.envelope.message_id = Some(id.as_str().to_string());
                    message.id = id;
                }
                if self.read_cached(message.id.as_str())?.is_some() {
                    continue;
                }

                let remote_result = {
                    let remote_guard = self.remote.lock().expect("remote lock poisoned");
                    remote_guard.as_ref().map(|remote| {
                        let raw = message.raw.clone().unwrap_or_default();
                        remote.append(&raw)
                    })
                };
                match remote_result {
                    Some(Err(e)) if mode.relaxes_server_first_on_write_failure() => {
                        tracing::warn!(folder = %self.folder_path, error = %e, "remote append failed; caching locally anyway");
                    }
                    Some(Err(e)) => return Err(MailCacheError::remote(e)),
                    Some(Ok(_)) | None => {}
                }

                let dir_name = self.disambiguate_dir_name(&crate::localstorage::name_format::format_message_dir_name(
                    message.sent_epoch_secs(),
                    message.envelope.subject.as_deref(),
                    now_epoch_millis(),
                ));
                message.dir_name = dir_name.clone();
                let message_dir = self.store.layout().message_dir(&self.folder_path, &dir_name);
                let flags: Vec<Flag> = message.flags.iter().cloned().collect();
                self.write_message_dir(
                    &message_dir,
                    &message.id,
                    &message.envelope,
                    &flags,
                    message.body_plain.as_deref(),
                    message.body_html.as_deref(),
                    &message.attachments,
                    message.raw.as_deref(),
                )?;
                appended.push(self.read_message_dir(&message_dir)?);
            }
            if !appended.is_empty() {
                self.store.publish(EventKind::FolderUpdated, ChangedItem::Folder { folder_path: self.folder_path.clone() });
            }
            Ok(appended)
        })
    }

    /// `setFlags(message, flags, value)`: write-gated, server first, then
    /// the local flags file.
    pub fn set_flags(&self, message_key: &str, flags: &[Flag], value: bool) -> Result<()> {
        self.store.mode.require_write("set_flags", |_mode| {
            let remote_guard = self.remote.lock().expect("remote lock poisoned");
            if let Some(remote) = remote_guard.as_ref() {
                remote
                    .set_flags(&RemoteMessageId(message_key.to_string()), flags, value)
                    .map_err(MailCacheError::remote)?;
            }
            drop(remote_guard);

            let message = self.read_cached(message_key)?.ok_or_else(|| MailCacheError::NotFound(message_key.to_string()))?;
            let message_dir = self.store.layout().message_dir(&self.folder_path, &message.dir_name);
            let mut current: HashSet<Flag> = message.flags;
            for flag in flags {
                if value {
                    current.insert(flag.clone());
                } else {
                    current.remove(flag);
                }
            }
            let text = current.iter().map(|f| f.token()).collect::<Vec<_>>().join("\n");
            layout::write_atomic(&self.store.layout().flags_file(&message_dir), text.as_bytes())?;
            self.store.publish(
                EventKind::MessageUpdated,
                ChangedItem::Message { folder_path: self.folder_path.clone(), message_id: message_key.to_string() },
            );
            Ok(())
        })
    }

    /// `delete(message)`: delete-gated archival move under `archive/` (§3).
    pub fn delete(&self, message_key: &str) -> Result<()> {
        self.store.mode.require_delete("delete_message", |_mode| {
            let message = self.read_cached(message_key)?.ok_or_else(|| MailCacheError::NotFound(message_key.to_string()))?;
            let message_dir = self.store.layout().message_dir(&self.folder_path, &message.dir_name);
            let destination = self.store.layout().archive_destination(&message.dir_name, now_epoch_millis());
            layout::move_dir(&message_dir, &destination)?;
            self.store.publish(
                EventKind::MessageRemoved,
                ChangedItem::Message { folder_path: self.folder_path.clone(), message_id: message_key.to_string() },
            );
            Ok(())
        })
    }

    /// `move(message, destination)`: write-gated. Under DESTRUCTIVE this is
    /// append-to-destination followed by delete-from-source; otherwise a
    /// copy plus flagging the source `\Deleted` (§4.3).
    pub fn move_to(&self, message_key: &str, destination: &FolderHandle) -> Result<()> {
        let message = self.read_cached(message_key)?.ok_or_else(|| MailCacheError::NotFound(message_key.to_string()))?;
        let destructive = self.store.mode() == Mode::Destructive;
        destination.append(vec![message])?;
        if destructive {
            self.delete(message_key)
        } else {
            self.set_flags(message_key, &[Flag::Deleted], true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::store::folder::{self, FolderHandle, OpenState};
    use crate::store::store::Store;
    use crate::store::Envelope;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sample_message(subject: &str) -> Message {
        Message {
            id: crate::message_id::MessageId::new(""),
            dir_name: String::new(),
            envelope: Envelope {
                subject: Some(subject.to_string()),
                from: vec![Address { display_name: Some("Alice Example".into()), local_part: "alice".into(), domain: Some("example.com".into()) }],
                date: Some(DateTime { timestamp: 1_700_000_000, tz_offset_secs: Some(-18_000) }),
                ..Default::default()
            },
            flags: HashSet::new(),
            body_plain: Some("hello".into()),
            body_html: None,
            attachments: Vec::new(),
            raw: Some(b"Subject: test\n\nhello".to_vec()),
        }
    }

    #[test]
    fn list_messages_pages_in_directory_name_order() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated));
        folder::create(&store, "INBOX").unwrap();
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        handle.append(vec![sample_message("one"), sample_message("two"), sample_message("three")]).unwrap();

        let all = handle.list_messages(0, 10).unwrap();
        assert_eq!(all.len(), 3);

        let first_page = handle.list_messages(0, 2).unwrap();
        let second_page = handle.list_messages(2, 2).unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(second_page.len(), 1);
        assert_eq!(first_page[0].dir_name, all[0].dir_name);
        assert_eq!(first_page[1].dir_name, all[1].dir_name);
        assert_eq!(second_page[0].dir_name, all[2].dir_name);
    }

    #[test]
    fn append_generates_message_id_when_absent() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated));
        folder::create(&store, "INBOX").unwrap();
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        let appended = handle.append(vec![sample_message("Hi")]).unwrap();
        assert_eq!(appended.len(), 1);
        assert!(appended[0].envelope.message_id.as_deref().unwrap().ends_with("@mailcache.generated>"));
    }

    #[test]
    fn get_is_idempotent_after_append() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated));
        folder::create(&store, "INBOX").unwrap();
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        let appended = handle.append(vec![sample_message("Hi")]).unwrap();
        let key = appended[0].id.as_str();
        let first = handle.get(key).unwrap();
        let second = handle.get(key).unwrap();
        assert_eq!(first.dir_name, second.dir_name);
        assert_eq!(first.id, second.id);
        assert_eq!(first.body_plain.is_some(), second.body_plain.is_some());
        assert_eq!(first.envelope.from, second.envelope.from);
        assert_eq!(first.envelope.from[0].local_part, "alice");
        assert_eq!(first.envelope.date.map(|d| d.timestamp), second.envelope.date.map(|d| d.timestamp));
        assert_eq!(first.envelope.date.unwrap().timestamp, 1_700_000_000);
    }

    #[test]
    fn delete_outside_destructive_leaves_message_intact() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Online));
        folder::create(&store, "INBOX").unwrap();
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        handle.store.set_mode(Mode::Accelerated);
        let appended = handle.append(vec![sample_message("Hi")]).unwrap();
        handle.store.set_mode(Mode::Online);
        let result = handle.delete(appended[0].id.as_str());
        assert!(matches!(result, Err(MailCacheError::ModeViolation { .. })));
        assert!(handle.get(appended[0].id.as_str()).is_ok());
    }

    #[test]
    fn append_persists_body_and_attachments_to_disk() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Accelerated));
        folder::create(&store, "INBOX").unwrap();
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        let mut message = sample_message("With attachment");
        message.body_html = Some("<p>hello</p>".into());
        message.attachments.push(crate::store::Attachment {
            filename: "notes.txt".into(),
            mime_type: "text/plain".into(),
            content: b"some notes".to_vec(),
        });
        let appended = handle.append(vec![message]).unwrap();
        let key = appended[0].id.as_str();
        let reloaded = handle.get(key).unwrap();
        assert_eq!(reloaded.body_plain.as_deref(), Some("hello"));
        assert_eq!(reloaded.body_html.as_deref(), Some("<p>hello</p>"));
        assert_eq!(reloaded.attachments.len(), 1);
        assert_eq!(reloaded.attachments[0].filename, "notes.txt");
        assert_eq!(reloaded.attachments[0].content, b"some notes");
    }

    #[test]
    fn delete_under_destructive_archives_message() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new("user@host", dir.path(), Mode::Destructive));
        folder::create(&store, "INBOX").unwrap();
        let handle = FolderHandle::open(store.clone(), "INBOX", OpenState::ReadWrite).unwrap();
        let appended = handle.append(vec![sample_message("Hi")]).unwrap();
        handle.delete(appended[0].id.as_str()).unwrap();
        assert!(handle.get(appended[0].id.as_str()).is_err());
        assert!(store.layout().archive_root().is_dir());
    }
}
