//! Search criteria (§4.3): a typed request shape rather than a free-form
//! query string, matching the minimum support the message repository must
//! offer: sender substring, subject substring, header-equals, sent-year.

use super::Message;

#[derive(Debug, Clone)]
pub enum SearchCriteria {
    SenderContains(String),
    SubjectContains(String),
    HeaderEquals { name: String, value: String },
    SentYear(i32),
    /// Conjunction of all listed criteria.
    All(Vec<SearchCriteria>),
}

impl SearchCriteria {
    /// Evaluate against a locally cached message. Used for the local scan
    /// path (OFFLINE/ACCELERATED and as a post-filter on remote results).
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            SearchCriteria::SenderContains(needle) => message
                .envelope
                .from
                .iter()
                .any(|a| address_text(a).to_ascii_lowercase().contains(&needle.to_ascii_lowercase())),
            SearchCriteria::SubjectContains(needle) => message
                .envelope
                .subject
                .as_deref()
                .map(|s| s.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
                .unwrap_or(false),
            SearchCriteria::HeaderEquals { name, value } => {
                if name.eq_ignore_ascii_case("Message-ID") {
                    message.envelope.message_id.as_deref() == Some(value.as_str())
                } else {
                    false
                }
            }
            SearchCriteria::SentYear(year) => message
                .sent_epoch_secs()
                .map(|ts| epoch_secs_to_year(ts) == *year)
                .unwrap_or(false),
            SearchCriteria::All(criteria) => criteria.iter().all(|c| c.matches(message)),
        }
    }
}

fn address_text(address: &super::Address) -> String {
    match (&address.display_name, &address.domain) {
        (Some(name), Some(domain)) => format!("{name} {}@{domain}", address.local_part),
        (Some(name), None) => format!("{name} {}", address.local_part),
        (None, Some(domain)) => format!("{}@{domain}", address.local_part),
        (None, None) => address.local_part.clone(),
    }
}

/// Extract the calendar year (UTC) from a unix timestamp via `chrono`.
fn epoch_secs_to_year(epoch_secs: i64) -> i32 {
    use chrono::Datelike;
    chrono::DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.year())
        .unwrap_or(1970)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_id::MessageId;
    use crate::store::{DateTime, Envelope};
    use std::collections::HashSet;

    fn sample() -> Message {
        Message {
            id: MessageId::new("<a@b>"),
            dir_name: "dir".into(),
            envelope: Envelope {
                from: vec![super::super::Address {
                    display_name: Some("Alice".into()),
                    local_part: "alice".into(),
                    domain: Some("example.com".into()),
                }],
                to: vec![],
                cc: vec![],
                date: Some(DateTime { timestamp: 1_700_000_000, tz_offset_secs: None }),
                subject: Some("Quarterly report".into()),
                message_id: Some("<a@b>".into()),
            },
            flags: HashSet::new(),
            body_plain: None,
            body_html: None,
            attachments: vec![],
            raw: None,
        }
    }

    #[test]
    fn sender_contains_is_case_insensitive() {
        assert!(SearchCriteria::SenderContains("ALICE".into()).matches(&sample()));
        assert!(!SearchCriteria::SenderContains("bob".into()).matches(&sample()));
    }

    #[test]
    fn subject_contains_matches_substring() {
        assert!(SearchCriteria::SubjectContains("quarterly".into()).matches(&sample()));
    }

    #[test]
    fn header_equals_message_id() {
        let c = SearchCriteria::HeaderEquals { name: "Message-ID".into(), value: "<a@b>".into() };
        assert!(c.matches(&sample()));
    }

    #[test]
    fn sent_year_matches_calendar_year() {
        assert!(SearchCriteria::SentYear(2023).matches(&sample()));
        assert!(!SearchCriteria::SentYear(2020).matches(&sample()));
    }

    #[test]
    fn all_is_a_conjunction() {
        let c = SearchCriteria::All(vec![
            SearchCriteria::SubjectContains("Quarterly".into()),
            SearchCriteria::SentYear(2020),
        ]);
        assert!(!c.matches(&sample()));
    }
}
