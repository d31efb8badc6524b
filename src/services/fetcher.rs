// src/services/fetcher.rs

//! Listing fetcher.
//!
//! Issues one browser-shaped GET per query and classifies the answer. A
//! single call is a single attempt; the orchestrator wraps it in the
//! configured [`RetryPolicy`](super::RetryPolicy).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};

use crate::error::{FetchError, FetchErrorKind, Result};
use crate::models::{FetcherConfig, Query};
use crate::services::ListingAdapter;
use crate::utils::http::create_async_client;

/// Page fragments that only appear on bot-defense interstitials.
const INTERSTITIAL_MARKERS: &[&str] = &[
    "<title>Just a moment...</title>",
    "Attention Required! | Cloudflare",
    "cf-browser-verification",
    "cf_chl_opt",
];

/// Weaker hints; real pages may embed them, so they only count on error statuses.
const CHALLENGE_HINTS: &[&str] = &["cf-chl", "challenge-platform", "Just a moment"];

/// Raw page content for one query.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub query: Query,
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

/// Source of raw listing content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// One attempt at retrieving the listing page for `query`.
    async fn fetch(&self, query: &Query) -> std::result::Result<RawListing, FetchError>;
}

/// Fetcher backed by a reqwest client.
pub struct HttpFetcher {
    client: Client,
    adapter: Arc<dyn ListingAdapter>,
}

impl HttpFetcher {
    /// Create a fetcher whose search URLs come from `adapter`.
    pub fn new(config: &FetcherConfig, adapter: Arc<dyn ListingAdapter>) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            adapter,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, query: &Query) -> std::result::Result<RawListing, FetchError> {
        let url = self.adapter.search_url(query);
        log::info!("Requesting {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_transport(&e))?;

        classify(status, &body).map_err(|e| e.with_retry_after(retry_after))?;

        log::debug!("Fetched {} bytes from {}", body.len(), final_url);
        Ok(RawListing {
            query: query.clone(),
            url: final_url,
            body,
        })
    }
}

/// Decide whether a response carries usable listing content.
pub fn classify(status: StatusCode, body: &str) -> std::result::Result<(), FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::new(
            FetchErrorKind::RateLimited,
            format!("HTTP {status}"),
        ));
    }
    if is_interstitial(body) || (!status.is_success() && has_challenge_hint(body)) {
        return Err(FetchError::new(
            FetchErrorKind::Blocked,
            format!("HTTP {status} with bot-defense challenge page"),
        ));
    }
    if status == StatusCode::FORBIDDEN || status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(FetchError::new(
            FetchErrorKind::Blocked,
            format!("HTTP {status}"),
        ));
    }
    if !status.is_success() {
        return Err(FetchError::new(
            FetchErrorKind::UnexpectedStatus,
            format!("HTTP {status}"),
        ));
    }
    Ok(())
}

fn is_interstitial(body: &str) -> bool {
    INTERSTITIAL_MARKERS.iter().any(|marker| body.contains(marker))
}

fn has_challenge_hint(body: &str) -> bool {
    CHALLENGE_HINTS.iter().any(|hint| body.contains(hint))
}

/// `Retry-After` in delta-seconds form; HTTP-date form is ignored.
fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
