// src/services/seek.rs

//! Seek listing adapter.
//!
//! Seek server-renders its search page with the full result set embedded as
//! `window.SEEK_REDUX_DATA = {...}`. That payload is the primary source;
//! the rendered job cards are the fallback when the payload is missing or
//! has moved.

use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::ParseError;
use crate::models::{CardSelectors, Posting, Query};
use crate::services::{ListingAdapter, ParsedListing, RawListing};
use crate::utils::url::{posting_id_from_url, resolve, slugify};
use crate::utils::non_empty;

const REDUX_MARKER: &str = "window.SEEK_REDUX_DATA";

/// Locations of the job array inside the embedded payload, tried in order.
const JOB_ARRAY_POINTERS: &[&str] = &[
    "/results/jobs",
    "/results/results/jobs",
    "/search/results/jobs",
    "/jobs",
];

const UNKNOWN: &str = "Unknown";

/// Compiled card selectors.
struct CompiledSelectors {
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    date: Selector,
}

/// Adapter for seek.com.au search result pages.
pub struct SeekAdapter {
    base_url: String,
    selectors: CompiledSelectors,
    id_attrs: Vec<String>,
    attr_name: String,
    no_results_markers: Vec<String>,
}

impl SeekAdapter {
    /// Create an adapter for the given site origin.
    pub fn new(base_url: &str, selectors: CardSelectors) -> Result<Self, ParseError> {
        let compiled = CompiledSelectors {
            card: parse_selector(&selectors.card_selector)?,
            title: parse_selector(&selectors.title_selector)?,
            company: parse_selector(&selectors.company_selector)?,
            location: parse_selector(&selectors.location_selector)?,
            date: parse_selector(&selectors.date_selector)?,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            selectors: compiled,
            id_attrs: selectors.id_attrs,
            attr_name: selectors.attr_name,
            no_results_markers: selectors.no_results_markers,
        })
    }

    fn job_url(&self, id: &str) -> String {
        format!("{}/job/{}", self.base_url, id)
    }

    // --- Embedded payload ---

    /// Postings from the embedded payload.
    ///
    /// `None` when the page has no payload or the payload has no job array.
    fn parse_embedded(&self, body: &str) -> Option<ParsedListing> {
        let payload = extract_embedded_json(body)?;
        let arrays: Vec<&Vec<Value>> = JOB_ARRAY_POINTERS
            .iter()
            .filter_map(|pointer| payload.pointer(pointer).and_then(Value::as_array))
            .collect();
        // An empty array only counts when no other location holds jobs.
        let jobs = arrays
            .iter()
            .find(|jobs| !jobs.is_empty())
            .or_else(|| arrays.first())?;

        let mut parsed = ParsedListing::default();
        for item in jobs.iter() {
            match self.posting_from_item(item) {
                Some(posting) => parsed.postings.push(posting),
                None => parsed.skipped += 1,
            }
        }
        Some(parsed)
    }

    fn posting_from_item(&self, item: &Value) -> Option<Posting> {
        let item = item.as_object()?;

        let (id, url) = match ["id", "jobId", "job_id"]
            .iter()
            .find_map(|key| item.get(*key).and_then(scalar_to_string))
        {
            Some(id) => {
                let url = self.job_url(&id);
                (id, url)
            }
            None => {
                let href = ["url", "jobUrl"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(Value::as_str))?;
                let url = resolve(&self.base_url, href);
                (posting_id_from_url(&url)?, url)
            }
        };

        let title = ["title", "occupation"]
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str).and_then(non_empty))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let company = match item.get("advertiser") {
            Some(Value::Object(adv)) => adv
                .get("description")
                .and_then(Value::as_str)
                .and_then(non_empty),
            Some(Value::String(s)) => non_empty(s),
            _ => None,
        }
        .or_else(|| {
            item.get("companyName")
                .and_then(Value::as_str)
                .and_then(non_empty)
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

        let location = item.get("location").and_then(label_text).or_else(|| {
            item.get("locations")
                .and_then(Value::as_array)
                .and_then(|locs| locs.first())
                .and_then(label_text)
        });

        let salary = item.get("salary").and_then(label_text);

        let posted_at = ["listingDate", "postedDate"]
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str))
            .and_then(normalize_date);

        Some(Posting {
            id,
            title,
            company,
            url,
            location,
            salary,
            posted_at,
        })
    }

    // --- DOM fallback ---

    fn parse_cards(&self, document: &Html, page_url: &str) -> ParsedListing {
        let mut parsed = ParsedListing::default();
        for card in document.select(&self.selectors.card) {
            match self.posting_from_card(&card, page_url) {
                Some(posting) => parsed.postings.push(posting),
                None => parsed.skipped += 1,
            }
        }
        parsed
    }

    fn posting_from_card(&self, card: &ElementRef, page_url: &str) -> Option<Posting> {
        let title_elem = card.select(&self.selectors.title).next()?;
        let title = non_empty(&title_elem.text().collect::<String>())?;

        let href = title_elem
            .value()
            .attr(&self.attr_name)
            .map(|h| resolve(page_url, h));

        let attr_id = self
            .id_attrs
            .iter()
            .find_map(|attr| card.value().attr(attr).and_then(non_empty));

        let (id, url) = match (attr_id, href) {
            (Some(id), _) => {
                let url = self.job_url(&id);
                (id, url)
            }
            (None, Some(href)) => (posting_id_from_url(&href)?, href),
            (None, None) => return None,
        };

        Some(Posting {
            id,
            title,
            company: first_text(card, &self.selectors.company)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            url,
            location: first_text(card, &self.selectors.location),
            salary: None,
            posted_at: first_text(card, &self.selectors.date),
        })
    }

    fn has_no_results_marker(&self, body: &str) -> bool {
        self.no_results_markers.iter().any(|m| body.contains(m.as_str()))
    }
}

impl ListingAdapter for SeekAdapter {
    fn name(&self) -> &str {
        "seek"
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "{}/{}-jobs/in-{}",
            self.base_url,
            slugify(&query.keywords),
            slugify(&query.location)
        )
    }

    fn parse(&self, raw: &RawListing) -> Result<ParsedListing, ParseError> {
        let embedded = self.parse_embedded(&raw.body);
        if let Some(parsed) = &embedded {
            if !parsed.postings.is_empty() {
                log::info!(
                    "Found {} postings via embedded data ({} skipped)",
                    parsed.postings.len(),
                    parsed.skipped
                );
                return Ok(parsed.clone());
            }
        }

        let document = Html::parse_document(&raw.body);
        let cards = self.parse_cards(&document, &raw.url);
        if !cards.postings.is_empty() || cards.skipped > 0 {
            log::info!(
                "Found {} postings via job cards ({} skipped)",
                cards.postings.len(),
                cards.skipped
            );
            return Ok(cards);
        }

        if let Some(parsed) = embedded {
            log::info!("Embedded data lists no jobs for {}", raw.query);
            return Ok(parsed);
        }
        if self.has_no_results_marker(&raw.body) {
            log::info!("Source reports no matching results for {}", raw.query);
            return Ok(ParsedListing::default());
        }

        Err(ParseError::structure(
            self.name(),
            format!(
                "no embedded job data, no job cards and no empty-result marker at {}",
                raw.url
            ),
        ))
    }
}

/// Locate `window.SEEK_REDUX_DATA = {...}` and decode the object literal.
///
/// The literal is read with a streaming decoder so trailing script text is
/// ignored. Bare `undefined` values are not JSON and are mapped to `null`.
fn extract_embedded_json(body: &str) -> Option<Value> {
    static UNDEFINED: OnceLock<Option<Regex>> = OnceLock::new();

    let rest = body.match_indices(REDUX_MARKER).find_map(|(start, _)| {
        let after = body[start + REDUX_MARKER.len()..].trim_start();
        after
            .strip_prefix('=')
            .filter(|value| !value.starts_with('='))
            .map(str::trim_start)
    })?;

    let first_try = serde_json::Deserializer::from_str(rest)
        .into_iter::<Value>()
        .next()
        .and_then(|r| r.ok());
    if first_try.is_some() {
        return first_try;
    }

    let undefined = UNDEFINED
        .get_or_init(|| Regex::new(r"([:\[,]\s*)undefined\b").ok())
        .as_ref()?;
    let cleaned = undefined.replace_all(rest, "${1}null");
    serde_json::Deserializer::from_str(&cleaned)
        .into_iter::<Value>()
        .next()
        .and_then(|r| r.ok())
}

/// String or number as a non-empty string.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Plain string, or an object's `label` / `description`.
fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Object(obj) => ["label", "description"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str).and_then(non_empty)),
        _ => None,
    }
}

/// RFC 3339 timestamps become `YYYY-MM-DD`; anything else is kept as-is.
fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = non_empty(raw)?;
    match DateTime::parse_from_rfc3339(&trimmed) {
        Ok(dt) => Some(dt.format("%Y-%m-%d").to_string()),
        Err(_) => Some(trimmed),
    }
}

fn first_text(scope: &ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .and_then(|el| non_empty(&el.text().collect::<String>()))
}

fn parse_selector(s: &str) -> Result<Selector, ParseError> {
    Selector::parse(s).map_err(|e| ParseError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.seek.com.au";

    fn adapter() -> SeekAdapter {
        SeekAdapter::new(BASE, CardSelectors::default()).unwrap()
    }

    fn raw(body: &str) -> RawListing {
        RawListing {
            query: Query::new("Python Developer", "All Australia"),
            url: format!("{BASE}/Python-Developer-jobs/in-All-Australia"),
            body: body.to_string(),
        }
    }

    fn redux_page(payload: &str) -> String {
        format!(
            "<html><head><script>window.SEEK_CONFIG = {{}};\n\
             window.SEEK_REDUX_DATA = {payload};\n\
             window.SEEK_APP_CONFIG = {{\"x\": 1}};</script></head><body></body></html>"
        )
    }

    #[test]
    fn test_search_url() {
        let url = adapter().search_url(&Query::new(" Python  Developer", "All Australia "));
        assert_eq!(url, "https://www.seek.com.au/Python-Developer-jobs/in-All-Australia");
    }

    #[test]
    fn test_parse_embedded_payload() {
        let body = redux_page(
            r#"{"results": {"results": {"jobs": [
                {"id": "81000003", "title": "Senior Python Developer",
                 "advertiser": {"description": "Acme"}, "location": "Sydney NSW",
                 "salary": "$150k", "listingDate": "2026-10-18T22:01:03Z"},
                {"jobId": 81000001, "occupation": "Backend Engineer",
                 "advertiser": "Globex", "locations": [{"label": "Remote"}]}
            ]}}}"#,
        );

        let parsed = adapter().parse(&raw(&body)).unwrap();
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.postings.len(), 2);

        let first = &parsed.postings[0];
        assert_eq!(first.id, "81000003");
        assert_eq!(first.title, "Senior Python Developer");
        assert_eq!(first.company, "Acme");
        assert_eq!(first.url, "https://www.seek.com.au/job/81000003");
        assert_eq!(first.location.as_deref(), Some("Sydney NSW"));
        assert_eq!(first.salary.as_deref(), Some("$150k"));
        assert_eq!(first.posted_at.as_deref(), Some("2026-10-18"));

        let second = &parsed.postings[1];
        assert_eq!(second.id, "81000001");
        assert_eq!(second.company, "Globex");
        assert_eq!(second.location.as_deref(), Some("Remote"));
    }

    #[test]
    fn test_parse_skips_entries_without_identity() {
        let body = redux_page(
            r#"{"results": {"jobs": [
                {"title": "No id or url"},
                {"id": "", "title": "Blank id"},
                {"id": "5", "title": "Valid"}
            ]}}"#,
        );

        let parsed = adapter().parse(&raw(&body)).unwrap();
        assert_eq!(parsed.postings.len(), 1);
        assert_eq!(parsed.postings[0].id, "5");
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn test_parse_tolerates_undefined_literals() {
        let body = redux_page(r#"{"jobs": [{"id": "9", "title": "Dev", "salary": undefined}]}"#);
        let parsed = adapter().parse(&raw(&body)).unwrap();
        assert_eq!(parsed.postings[0].id, "9");
        assert_eq!(parsed.postings[0].salary, None);
    }

    #[test]
    fn test_parse_skips_marker_references() {
        let body = format!(
            "<script>if (window.SEEK_REDUX_DATA == null) {{}}</script>{}",
            redux_page(r#"{"jobs": [{"id": "11", "title": "Dev"}]}"#)
        );
        let parsed = adapter().parse(&raw(&body)).unwrap();
        assert_eq!(parsed.postings[0].id, "11");
    }

    #[test]
    fn test_parse_ids_are_deterministic() {
        let body = redux_page(r#"{"jobs": [{"url": "/job/123?type=promoted", "title": "A"}]}"#);
        let a = adapter().parse(&raw(&body)).unwrap();
        let b = adapter().parse(&raw(&body)).unwrap();
        assert_eq!(a.postings[0].id, "123");
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_dom_fallback() {
        let body = r#"
            <html><body>
            <article data-automation="job-card" data-job-id="700">
              <a data-automation="jobTitle" href="/job/700?ref=search">  Rust
                 Engineer </a>
              <a data-automation="jobCompany">Initech</a>
              <a data-automation="jobLocation">Brisbane QLD</a>
              <span data-automation="jobListingDate">2d ago</span>
            </article>
            <article data-automation="job-card">
              <a data-automation="jobTitle" href="/job/699">Data Engineer</a>
            </article>
            <article data-automation="job-card" data-job-id="698">
              <span>no title link</span>
            </article>
            </body></html>"#;

        let parsed = adapter().parse(&raw(body)).unwrap();
        assert_eq!(parsed.postings.len(), 2);
        assert_eq!(parsed.skipped, 1);

        let first = &parsed.postings[0];
        assert_eq!(first.id, "700");
        assert_eq!(first.title, "Rust Engineer");
        assert_eq!(first.company, "Initech");
        assert_eq!(first.url, "https://www.seek.com.au/job/700");
        assert_eq!(first.posted_at.as_deref(), Some("2d ago"));

        let second = &parsed.postings[1];
        assert_eq!(second.id, "699");
        assert_eq!(second.company, UNKNOWN);
        assert_eq!(second.url, "https://www.seek.com.au/job/699");
    }

    #[test]
    fn test_parse_empty_embedded_list_is_valid() {
        let body = redux_page(r#"{"results": {"jobs": []}}"#);
        let parsed = adapter().parse(&raw(&body)).unwrap();
        assert!(parsed.postings.is_empty());
    }

    #[test]
    fn test_parse_empty_array_does_not_hide_later_jobs() {
        let body = redux_page(
            r#"{"results": {"jobs": []},
                "search": {"results": {"jobs": [{"id": "1", "title": "Dev"}]}}}"#,
        );
        let parsed = adapter().parse(&raw(&body)).unwrap();
        assert_eq!(parsed.postings.len(), 1);
        assert_eq!(parsed.postings[0].id, "1");
    }

    #[test]
    fn test_parse_no_results_marker_is_valid() {
        let body = r#"<div data-automation="searchZeroResults">No matching search results</div>"#;
        assert!(adapter().parse(&raw(body)).unwrap().postings.is_empty());
    }

    #[test]
    fn test_parse_unrecognized_page_is_structure_error() {
        let err = adapter()
            .parse(&raw("<html><body><h1>Welcome</h1></body></html>"))
            .unwrap_err();
        assert!(matches!(err, ParseError::StructureMismatch { .. }));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let selectors = CardSelectors {
            card_selector: "[[invalid".to_string(),
            ..CardSelectors::default()
        };
        assert!(matches!(
            SeekAdapter::new(BASE, selectors),
            Err(ParseError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(
            normalize_date("2026-10-18T22:01:03+10:00"),
            Some("2026-10-18".to_string())
        );
        assert_eq!(normalize_date("Listed yesterday"), Some("Listed yesterday".to_string()));
        assert_eq!(normalize_date("  "), None);
    }
}
