use chrono::Utc;
use regex_lite::Regex;

/// UTC timestamp in the fixed textual format shared by every persisted
/// document and operator-visible message.
pub fn now_utc() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn epoch_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Random eight-hex-digit suffix for request and consensus run ids.
pub fn short_hex() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Compile a pattern that is a literal in this crate; a failure is a bug
/// in the literal, not a runtime condition.
pub(crate) fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| {
        panic!("failed to compile regex {pattern}: {err}");
    })
}

/// At most `max_chars` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Remainder of `text` after skipping `n` whitespace-separated tokens.
/// Internal whitespace of the remainder is preserved; returns the empty
/// string when fewer than `n + 1` tokens exist.
pub fn after_tokens(text: &str, n: usize) -> &str {
    let mut rest = text.trim_start();
    for _ in 0..n {
        match rest.find(char::is_whitespace) {
            Some(idx) => rest = rest[idx..].trim_start(),
            None => return "",
        }
    }
    rest
}
