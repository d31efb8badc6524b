// src/models/mod.rs

//! Domain models for the monitor.

mod config;
mod posting;
mod query;
mod selectors;

// Re-export all public types
pub use config::{
    CommitMode, Config, FetcherConfig, LoggingConfig, NotifierConfig, RunConfig, SearchConfig,
    StateBackend, StateConfig,
};
pub use posting::Posting;
pub use query::Query;
pub use selectors::CardSelectors;
