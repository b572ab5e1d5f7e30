//! Message and envelope types cached per folder (§3).

use crate::message_id::MessageId;
use std::collections::HashSet;
use std::fmt;

/// Email or display address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub display_name: Option<String>,
    pub local_part: String,
    pub domain: Option<String>,
}

impl Address {
    /// Render as a single header-line value: `"Display Name" <local@domain>`
    /// when a display name is present, otherwise the bare address spec.
    /// One address per line, since `From`/`To`/`Cc` are multi-valued headers
    /// that repeat the key rather than comma-join on one line (§6).
    pub fn to_header_value(&self) -> String {
        let addr_spec = match &self.domain {
            Some(domain) => format!("{}@{domain}", self.local_part),
            None => self.local_part.clone(),
        };
        match &self.display_name {
            Some(name) => format!("{name} <{addr_spec}>"),
            None => addr_spec,
        }
    }

    /// Parse one `from`/`to`/`cc` header-line value back into an [`Address`].
    pub fn from_header_value(value: &str) -> Self {
        let value = value.trim();
        let (display_name, addr_spec) = match (value.find('<'), value.ends_with('>')) {
            (Some(open), true) => {
                let display = value[..open].trim().trim_matches('"').trim();
                let spec = &value[open + 1..value.len() - 1];
                (if display.is_empty() { None } else { Some(display.to_string()) }, spec.trim())
            }
            _ => (None, value),
        };
        match addr_spec.rsplit_once('@') {
            Some((local, domain)) => Address { display_name, local_part: local.to_string(), domain: Some(domain.to_string()) },
            None => Address { display_name, local_part: addr_spec.to_string(), domain: None },
        }
    }
}

/// Date/time for a message envelope, stored as a unix timestamp plus the
/// zone offset it was observed in (when known).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub timestamp: i64,
    pub tz_offset_secs: Option<i32>,
}

impl DateTime {
    /// Render as a single header-line value: epoch seconds, plus the zone
    /// offset in seconds when known.
    pub fn to_header_value(&self) -> String {
        match self.tz_offset_secs {
            Some(offset) => format!("{} {offset}", self.timestamp),
            None => self.timestamp.to_string(),
        }
    }

    /// Parse a `Date` header-line value written by [`DateTime::to_header_value`].
    pub fn from_header_value(value: &str) -> Option<Self> {
        let mut parts = value.split_whitespace();
        let timestamp: i64 = parts.next()?.parse().ok()?;
        let tz_offset_secs = parts.next().and_then(|s| s.parse().ok());
        Some(DateTime { timestamp, tz_offset_secs })
    }
}

/// Header-derived metadata for a message, independent of body/attachments.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub from: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub date: Option<DateTime>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
}

/// Message flag. A set of these is the flags file's in-memory form; tokens
/// round-trip through [`Flag::token`] / [`Flag::from_token`] for persistence.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Custom(String),
}

impl Flag {
    pub fn token(&self) -> String {
        match self {
            Flag::Seen => "\\Seen".to_string(),
            Flag::Answered => "\\Answered".to_string(),
            Flag::Flagged => "\\Flagged".to_string(),
            Flag::Deleted => "\\Deleted".to_string(),
            Flag::Draft => "\\Draft".to_string(),
            Flag::Custom(name) => name.clone(),
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            "\\Seen" => Flag::Seen,
            "\\Answered" => Flag::Answered,
            "\\Flagged" => Flag::Flagged,
            "\\Deleted" => Flag::Deleted,
            "\\Draft" => Flag::Draft,
            other => Flag::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// An attachment cached alongside a message's body.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// A cached message: envelope, flags, bodies, attachments, and the
/// identifiers that place it inside its folder's `messages/` tree.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    /// Name of this message's directory under `messages/`, stable once
    /// assigned (§3).
    pub dir_name: String,
    pub envelope: Envelope,
    pub flags: HashSet<Flag>,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Optional MIME source, persisted as `raw.eml` when present.
    pub raw: Option<Vec<u8>>,
}

impl Message {
    pub fn sent_epoch_secs(&self) -> Option<i64> {
        self.envelope.date.map(|d| d.timestamp)
    }

    pub fn is_flagged(&self) -> bool {
        self.flags.contains(&Flag::Flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_with_display_name_round_trips() {
        let addr = Address { display_name: Some("Alice Example".into()), local_part: "alice".into(), domain: Some("example.com".into()) };
        let parsed = Address::from_header_value(&addr.to_header_value());
        assert_eq!(parsed, addr);
    }

    #[test]
    fn bare_address_without_display_name_round_trips() {
        let addr = Address { display_name: None, local_part: "bob".into(), domain: Some("example.com".into()) };
        let parsed = Address::from_header_value(&addr.to_header_value());
        assert_eq!(parsed, addr);
    }

    #[test]
    fn address_without_domain_round_trips() {
        let addr = Address { display_name: None, local_part: "localonly".into(), domain: None };
        let parsed = Address::from_header_value(&addr.to_header_value());
        assert_eq!(parsed, addr);
    }

    #[test]
    fn date_with_offset_round_trips() {
        let dt = DateTime { timestamp: 1_700_000_000, tz_offset_secs: Some(-18_000) };
        assert_eq!(DateTime::from_header_value(&dt.to_header_value()), Some(dt));
    }

    #[test]
    fn date_without_offset_round_trips() {
        let dt = DateTime { timestamp: 1_700_000_000, tz_offset_secs: None };
        assert_eq!(DateTime::from_header_value(&dt.to_header_value()), Some(dt));
    }
}
