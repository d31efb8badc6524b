// src/lib.rs

//! Seek job monitor library.
//!
//! Fetches a job search, diffs it against the ids already notified, sends
//! one notification per new posting and records it only after delivery.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
