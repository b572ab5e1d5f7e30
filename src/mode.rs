//! Mode state machine: five operating modes, each a 4-tuple of predicates
//! gating reads, searches, writes, and deletes (spec.md §4.1). `ModeGate`
//! holds the current mode behind a `RwLock` so a mode switch observes
//! mutual exclusion with any in-flight operation on the same store (§5).

use crate::error::{MailCacheError, Result};
use std::sync::RwLock;

/// One of the five operating modes a `Store` can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Offline,
    Accelerated,
    Online,
    Refresh,
    Destructive,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Offline => "OFFLINE",
            Mode::Accelerated => "ACCELERATED",
            Mode::Online => "ONLINE",
            Mode::Refresh => "REFRESH",
            Mode::Destructive => "DESTRUCTIVE",
        }
    }

    /// Always attempt a remote read first (falls back to cache only on miss
    /// in `Accelerated`/`Online`; never attempted in `Offline`).
    pub fn reads_from_server(self) -> bool {
        matches!(self, Mode::Refresh | Mode::Destructive)
    }

    /// Reads fall back to a remote fetch when the item is not cached locally.
    /// `Offline` never falls back; `Refresh`/`Destructive` always read from
    /// the server so there is no "fallback" case to speak of.
    pub fn reads_fall_back_to_server(self) -> bool {
        matches!(self, Mode::Accelerated | Mode::Online)
    }

    pub fn searches_on_server(self) -> bool {
        matches!(self, Mode::Online | Mode::Refresh | Mode::Destructive)
    }

    pub fn write_allowed(self) -> bool {
        !matches!(self, Mode::Offline)
    }

    pub fn delete_allowed(self) -> bool {
        matches!(self, Mode::Destructive)
    }

    /// `true` for `Accelerated`, the one mode where a remote write failure is
    /// logged and the local side effect proceeds anyway (spec.md §4.3, §7).
    pub fn relaxes_server_first_on_write_failure(self) -> bool {
        matches!(self, Mode::Accelerated)
    }
}

/// Guards the current [`Mode`] of one store behind a `RwLock`. Mutating
/// operations take a shared read guard for their whole duration (so the
/// mode cannot change mid-call); `set_mode` takes the exclusive write guard.
#[derive(Debug)]
pub struct ModeGate {
    mode: RwLock<Mode>,
}

impl ModeGate {
    pub fn new(initial: Mode) -> Self {
        Self { mode: RwLock::new(initial) }
    }

    pub fn current(&self) -> Mode {
        *self.mode.read().expect("mode lock poisoned")
    }

    /// Atomically replace the mode. Per spec.md §4.1, transitions are
    /// otherwise unrestricted; closing the remote handle on a transition
    /// into `Offline` is the caller's (Store's) responsibility.
    pub fn set_mode(&self, new_mode: Mode) -> Mode {
        let mut guard = self.mode.write().expect("mode lock poisoned");
        let previous = *guard;
        *guard = new_mode;
        tracing::debug!(from = previous.name(), to = new_mode.name(), "mode transition");
        previous
    }

    /// Require that writes are permitted under the mode held for the
    /// duration of `f`. `operation` is used only for the error message.
    pub fn require_write<T>(&self, operation: &'static str, f: impl FnOnce(Mode) -> Result<T>) -> Result<T> {
        let guard = self.mode.read().expect("mode lock poisoned");
        let mode = *guard;
        tracing::debug!(mode = mode.name(), operation, "write-gated operation");
        if !mode.write_allowed() {
            return Err(MailCacheError::ModeViolation { mode: mode.name(), operation });
        }
        f(mode)
    }

    /// Require that deletes are permitted under the mode held for the
    /// duration of `f`.
    pub fn require_delete<T>(&self, operation: &'static str, f: impl FnOnce(Mode) -> Result<T>) -> Result<T> {
        let guard = self.mode.read().expect("mode lock poisoned");
        let mode = *guard;
        tracing::debug!(mode = mode.name(), operation, "delete-gated operation");
        if !mode.delete_allowed() {
            return Err(MailCacheError::ModeViolation { mode: mode.name(), operation });
        }
        f(mode)
    }

    /// Run any mode-gated read/search without a hard precondition; `f`
    /// receives the stable mode snapshot to make its own read/fallback
    /// decision (Offline vs fallback vs always-remote).
    pub fn with_mode<T>(&self, f: impl FnOnce(Mode) -> Result<T>) -> Result<T> {
        let guard = self.mode.read().expect("mode lock poisoned");
        f(*guard)
    }
}
