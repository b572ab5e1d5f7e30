//! Pure message-directory name formatting (§4.7). Produces
//! `YYYY-MM-DD_HH-MM_SanitizedSubject`, capped at 100 characters for the
//! subject portion, sanitizing the reserved filesystem character set.

const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];
const MAX_SUBJECT_LEN: usize = 100;

/// Replace every reserved character with `_`. Pure string transform, not a
/// reversible encoding: unlike a percent-style codec there is no decode.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect()
}

/// Build the message-directory name for a message with the given sent
/// timestamp (unix seconds, `None` when the source lacked a date — current
/// time is substituted by the caller) and subject.
///
/// `sent_epoch_secs` and `now_epoch_millis` are passed in rather than read
/// from the clock so the formatter stays pure and deterministic for tests.
pub fn format_message_dir_name(
    sent_epoch_secs: Option<i64>,
    subject: Option<&str>,
    now_epoch_millis: u128,
) -> String {
    let ts = sent_epoch_secs.unwrap_or_else(|| (now_epoch_millis / 1000) as i64);
    let (date_part, time_part) = format_date_time(ts);
    let subject_part = match subject {
        Some(s) if !s.is_empty() => {
            let sanitized = sanitize(s);
            truncate_chars(&sanitized, MAX_SUBJECT_LEN)
        }
        _ => format!("NoSubject_{now_epoch_millis}"),
    };
    format!("{date_part}_{time_part}_{subject_part}")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Civil calendar conversion from a unix timestamp (UTC), formatted as
/// `(YYYY-MM-DD, HH-MM)`. Uses `chrono` (the teacher's date/time crate,
/// `tagliacarte_core`'s own RFC 5322 date parsing depends on it) rather
/// than hand-rolled calendar arithmetic, since the cache only needs a
/// stable, sortable directory name, not a display date in any particular
/// zone.
fn format_date_time(epoch_secs: i64) -> (String, String) {
    let dt = chrono::DateTime::from_timestamp(epoch_secs, 0)
        .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).expect("unix epoch is representable"));
    (dt.format("%Y-%m-%d").to_string(), dt.format("%H-%M").to_string())
}

/// Resolve a name collision by appending `_<counter>` until the name is free
/// to use, per §4.5. `exists` is a caller-supplied existence check so this
/// function stays pure with respect to the filesystem.
pub fn disambiguate(base_name: &str, mut exists: impl FnMut(&str) -> bool) -> String {
    if !exists(base_name) {
        return base_name.to_string();
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{base_name}_{counter}");
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize("a/b:c*d?e\"f<g>h|i\\j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn determinism_same_inputs_same_name() {
        let a = format_message_dir_name(Some(1_700_000_000), Some("Hello World"), 1_700_000_000_000);
        let b = format_message_dir_name(Some(1_700_000_000), Some("Hello World"), 1_700_000_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn missing_subject_uses_no_subject_epoch() {
        let name = format_message_dir_name(Some(1_700_000_000), None, 1_700_000_000_123);
        assert!(name.ends_with("NoSubject_1700000000123"));
    }

    #[test]
    fn subject_truncated_to_100_chars() {
        let long = "x".repeat(250);
        let name = format_message_dir_name(Some(0), Some(&long), 0);
        let subject_part = name.splitn(3, '_').nth(2).unwrap();
        assert_eq!(subject_part.chars().count(), 100);
    }

    #[test]
    fn disambiguate_appends_counter() {
        let taken = ["a", "a_1", "a_2"];
        let result = disambiguate("a", |n| taken.contains(&n));
        assert_eq!(result, "a_3");
    }

    #[test]
    fn disambiguate_returns_base_when_free() {
        assert_eq!(disambiguate("free", |_| false), "free");
    }
}
