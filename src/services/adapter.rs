// src/services/adapter.rs

//! Listing adapter interface.
//!
//! An adapter owns everything that is specific to one listing site: how a
//! search URL is shaped and how a page turns into postings. Changing sites
//! or surviving a layout change touches only the adapter.

use crate::error::ParseError;
use crate::models::{Posting, Query};
use crate::services::RawListing;

/// Postings extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedListing {
    /// Postings in page order (newest first on most sites)
    pub postings: Vec<Posting>,
    /// Entries that were present but malformed
    pub skipped: usize,
}

/// Site-specific translation between queries, pages, and postings.
pub trait ListingAdapter: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Listing page URL for a query.
    fn search_url(&self, query: &Query) -> String;

    /// Extract postings from a fetched page.
    ///
    /// Fails only when the expected page structure is entirely absent;
    /// individual malformed entries are skipped and counted.
    fn parse(&self, raw: &RawListing) -> Result<ParsedListing, ParseError>;
}
