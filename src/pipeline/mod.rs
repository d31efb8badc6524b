//! Pipeline entry points for monitor runs.
//!
//! - `diff`: fetched postings minus seen ids
//! - `run`: the fetch → parse → diff → notify → commit state machine
//! - `run_monitor`: build a run from configuration and execute it

pub mod diff;
pub mod monitor;
pub mod run;

pub use diff::diff;
pub use monitor::{build_store, describe, run_monitor, run_options};
pub use run::{Orchestrator, RunMode, RunOptions, RunReport, RunStage, RunStatus};
