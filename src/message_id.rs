//! Stable message identifier: the sanitized `Message-ID` header value, used
//! as the alternate key for a cached message. Messages without a
//! `Message-ID` on append are assigned a generated one before any server
//! I/O (spec.md §3, §4.3).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque message-id. Always non-empty; either taken from the source
/// message's `Message-ID` header or generated by [`generate_message_id`].
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Generate a fresh message-id in the form `<epochMillis.index@mailcache.generated>`.
/// The index is a process-wide monotonic counter so ids generated within the
/// same millisecond never collide.
pub fn generate_message_id() -> MessageId {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let index = COUNTER.fetch_add(1, Ordering::Relaxed);
    let epoch_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    MessageId::new(format!("<{epoch_millis}.{index}@mailcache.generated>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with('<'));
        assert!(a.as_str().ends_with("@mailcache.generated>"));
    }

    #[test]
    fn display_matches_as_str() {
        let id = MessageId::new("<abc@example.com>");
        assert_eq!(format!("{id}"), "<abc@example.com>");
    }
}
