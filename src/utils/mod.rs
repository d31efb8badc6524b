//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod url;

/// Collapse whitespace runs and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text, or `None` when nothing remains.
pub fn non_empty(s: &str) -> Option<String> {
    let normalized = normalize_whitespace(s);
    (!normalized.is_empty()).then_some(normalized)
}
