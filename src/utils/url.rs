// src/utils/url.rs

//! URL manipulation utilities.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// # Examples
/// ```
/// use seek_monitor::utils::url::resolve;
///
/// assert_eq!(
///     resolve("https://example.com/path/", "page.html"),
///     "https://example.com/path/page.html"
/// );
/// ```
pub fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Turn free text into a path slug: trimmed, whitespace runs become `-`.
///
/// # Examples
/// ```
/// use seek_monitor::utils::url::slugify;
///
/// assert_eq!(slugify("  Python   Developer "), "Python-Developer");
/// ```
pub fn slugify(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Canonical form of a posting URL: scheme, host and path only.
///
/// Scheme and host are case-folded by the parser; the path keeps its case.
///
/// Tracking parameters and fragments differ between page loads for the same
/// ad, so they never take part in identity.
pub fn canonicalize(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    let mut s = parsed.to_string();
    if s.ends_with('/') && parsed.path() != "/" {
        s.pop();
    }
    Some(s)
}

/// Extract the numeric job ID from a `/job/<digits>` URL.
pub fn extract_job_id(url: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"/job/(\d+)(?:[/?#]|$)").ok())
        .as_ref()?;
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Derive a stable posting ID from its URL.
///
/// Prefers the job ID embedded in the path; otherwise hashes the canonical
/// URL so the same ad always maps to the same ID.
pub fn posting_id_from_url(url: &str) -> Option<String> {
    if let Some(id) = extract_job_id(url) {
        return Some(id);
    }
    let canonical = canonicalize(url)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Some(format!("url-{}", &hex::encode(digest)[..16]))
}
