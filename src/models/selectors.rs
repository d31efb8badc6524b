// src/models/selectors.rs

//! CSS selectors for scraping job cards out of a listing page.

use serde::{Deserialize, Serialize};

/// CSS selectors used by the DOM fallback of the listing adapter.
///
/// Kept in configuration so a markup change can be handled without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardSelectors {
    /// Selector for each job card
    #[serde(default = "defaults::card")]
    pub card_selector: String,

    /// Selector for the title link within a card
    #[serde(default = "defaults::title")]
    pub title_selector: String,

    /// Selector for the advertiser within a card
    #[serde(default = "defaults::company")]
    pub company_selector: String,

    /// Selector for the location within a card
    #[serde(default = "defaults::location")]
    pub location_selector: String,

    /// Selector for the listing date within a card
    #[serde(default = "defaults::date")]
    pub date_selector: String,

    /// Card attributes that may carry the source's job ID, tried in order
    #[serde(default = "defaults::id_attrs")]
    pub id_attrs: Vec<String>,

    /// HTML attribute name for extracting links (usually "href")
    #[serde(default = "defaults::attr_name")]
    pub attr_name: String,

    /// Page fragments that mean "the search legitimately matched nothing"
    #[serde(default = "defaults::no_results_markers")]
    pub no_results_markers: Vec<String>,
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            card_selector: defaults::card(),
            title_selector: defaults::title(),
            company_selector: defaults::company(),
            location_selector: defaults::location(),
            date_selector: defaults::date(),
            id_attrs: defaults::id_attrs(),
            attr_name: defaults::attr_name(),
            no_results_markers: defaults::no_results_markers(),
        }
    }
}

mod defaults {
    pub fn card() -> String {
        r#"article[data-automation="job-card"]"#.into()
    }
    pub fn title() -> String {
        r#"a[data-automation="jobTitle"]"#.into()
    }
    pub fn company() -> String {
        r#"a[data-automation="jobCompany"]"#.into()
    }
    pub fn location() -> String {
        r#"a[data-automation="jobLocation"]"#.into()
    }
    pub fn date() -> String {
        r#"span[data-automation="jobListingDate"]"#.into()
    }
    pub fn id_attrs() -> Vec<String> {
        vec!["data-job-id".into(), "data-automation-id".into()]
    }
    pub fn attr_name() -> String {
        "href".into()
    }
    pub fn no_results_markers() -> Vec<String> {
        vec![
            r#"data-automation="searchZeroResults""#.into(),
            "No matching search results".into(),
        ]
    }
}
