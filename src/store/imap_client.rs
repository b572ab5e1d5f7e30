//! Abstract IMAP client capability (§6). Only this trait is required by the
//! core; a concrete wire client lives in an outer crate and is injected into
//! a [`crate::store::Store`] at construction time.

use crate::store::{Attachment, Envelope, Flag};
use std::fmt;

/// Remote-side identifier for one message, opaque to the core beyond
/// equality and ordering (an IMAP UID, in a concrete client).
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct RemoteMessageId(pub String);

impl fmt::Display for RemoteMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header and size metadata for one remote message, enough to materialize
/// it locally without fetching the full body.
#[derive(Debug, Clone)]
pub struct RemoteMessageSummary {
    pub remote_id: RemoteMessageId,
    pub envelope: Envelope,
    pub flags: Vec<Flag>,
    pub size: u64,
}

/// Full remote message content, fetched on a cache miss or during append.
/// `body_plain`/`body_html`/`attachments` are whatever the concrete client's
/// MIME handling already extracted; the core never parses `raw` itself
/// (MIME parsing is an external collaborator's concern, §1).
#[derive(Debug, Clone)]
pub struct RemoteMessageContent {
    pub summary: RemoteMessageSummary,
    pub raw: Vec<u8>,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl RemoteMessageContent {
    pub fn new(summary: RemoteMessageSummary, raw: Vec<u8>) -> Self {
        Self { summary, raw, body_plain: None, body_html: None, attachments: Vec::new() }
    }
}

/// Whether a remote folder handle was opened for reading only or for
/// reading and writing (§4.2's folder open state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOpenMode {
    ReadOnly,
    ReadWrite,
}

/// A remote folder handle, opened via [`ImapClient::open_folder`].
pub trait RemoteFolder: Send + Sync {
    fn list_summaries(&self) -> Result<Vec<RemoteMessageSummary>, RemoteError>;
    fn fetch(&self, remote_id: &RemoteMessageId) -> Result<RemoteMessageContent, RemoteError>;
    fn append(&self, raw: &[u8]) -> Result<RemoteMessageId, RemoteError>;
    fn set_flags(&self, remote_id: &RemoteMessageId, flags: &[Flag], value: bool) -> Result<(), RemoteError>;
    fn expunge(&self) -> Result<(), RemoteError>;
    fn close(&self);
}

/// Minimal information describing a remote mailbox, as returned by
/// [`ImapClient::list_children`].
#[derive(Debug, Clone)]
pub struct RemoteFolderInfo {
    pub name: String,
}

/// Abstract connection to one account's remote mailboxes.
pub trait ImapClient: Send + Sync {
    fn list_children(&self, parent: &str) -> Result<Vec<RemoteFolderInfo>, RemoteError>;
    fn folder_exists(&self, name: &str) -> Result<bool, RemoteError>;
    fn open_folder(&self, name: &str, mode: RemoteOpenMode) -> Result<Box<dyn RemoteFolder>, RemoteError>;
    fn create_folder(&self, name: &str) -> Result<(), RemoteError>;
    fn rename_folder(&self, old_name: &str, new_name: &str) -> Result<(), RemoteError>;
    fn delete_folder(&self, name: &str) -> Result<(), RemoteError>;
    fn disconnect(&self);
}

/// Opaque transport failure from a concrete `ImapClient` implementation.
#[derive(Debug)]
pub struct RemoteError(pub String);

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RemoteError {}

impl RemoteError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
