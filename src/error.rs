//! Cache engine error taxonomy: one variant per category in the mode-gating
//! and store contracts. Every public operation returns `Result<T, MailCacheError>`.

use std::path::PathBuf;

/// Errors surfaced by the Store, Folder, Message repositories, and Synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum MailCacheError {
    /// The current mode forbids the requested operation. Never retried.
    #[error("operation not permitted in mode {mode}: {operation}")]
    ModeViolation { mode: &'static str, operation: &'static str },

    /// Requested item is absent locally and the mode forbids a remote fetch.
    #[error("not cached: {0}")]
    NotCached(String),

    /// Remote IMAP I/O failed. Callers interpret this per the mode-specific
    /// fallback policy in `MailCacheError`'s call sites (§7 of the spec).
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Local filesystem operation failed.
    #[error("local I/O failure at {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Folder or message does not exist in either location.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation attempted on a closed folder or closed store.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The owning store was closed while the operation was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl MailCacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoFailure { path: path.into(), source }
    }

    pub fn remote(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::RemoteUnavailable(Box::new(source))
    }

    pub fn remote_msg(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(Box::new(SimpleError(msg.into())))
    }

    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

/// Minimal string error used to box a plain message as the `RemoteUnavailable` source.
#[derive(Debug)]
struct SimpleError(String);

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SimpleError {}

pub type Result<T> = std::result::Result<T, MailCacheError>;
