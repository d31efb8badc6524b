//! Job posting data structure.

use serde::{Deserialize, Serialize};

/// A job advertisement normalized by a listing adapter.
///
/// Only `id` takes part in deduplication; every other field is descriptive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Posting {
    /// Stable identifier, identical for the same ad across runs
    pub id: String,

    /// Job title
    pub title: String,

    /// Advertiser / company name
    pub company: String,

    /// Canonical link to the ad
    pub url: String,

    /// Human-readable location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Salary text as shown by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,

    /// Listing date, best effort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
}
