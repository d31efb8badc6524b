//! Service layer for the monitor.
//!
//! This module contains the moving parts of a run:
//! - Listing retrieval (`HttpFetcher`)
//! - Site-specific parsing (`SeekAdapter` behind `ListingAdapter`)
//! - Notification delivery (`TelegramNotifier`, `LogNotifier`)
//! - Bounded retry (`RetryPolicy`)

mod adapter;
mod fetcher;
mod notifier;
mod retry;
mod seek;

pub use adapter::{ListingAdapter, ParsedListing};
pub use fetcher::{Fetcher, HttpFetcher, RawListing, classify};
pub use notifier::{LogNotifier, MESSAGE_LIMIT, Notifier, TelegramNotifier, render_message};
pub use retry::{RetryPolicy, Retryable};
pub use seek::SeekAdapter;
