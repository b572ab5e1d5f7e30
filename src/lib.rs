//! Mode-gated local cache of remote IMAP mailboxes: a write-through /
//! read-through store keyed on folder hierarchy and per-message content,
//! with five operating modes gating reads, searches, writes, and deletes.
//!
//! Entry points: [`store::registry::Runtime`] opens and tracks per-account
//! [`store::Store`] handles; [`store::FolderHandle`] opens one folder and
//! exposes the message-repository operations; [`store::synchronizer`] and
//! [`store::cache_manager`] provide the maintenance surfaces.

pub mod config;
pub mod error;
pub mod events;
pub mod localstorage;
pub mod message_id;
pub mod mode;
pub mod store;
