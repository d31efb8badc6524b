//! Search query parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the fetcher asks the listing source for. Immutable for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    pub keywords: String,
    pub location: String,
}

impl Query {
    pub fn new(keywords: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in '{}'", self.keywords, self.location)
    }
}
