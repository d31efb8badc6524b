// src/lambda/mod.rs

//! AWS Lambda handler for scheduled monitor runs.
//!
//! The function is triggered by a schedule rule. Configuration comes from
//! the bundled TOML file (if any) and the function's environment; seen state
//! normally lives in S3 (`S3_BUCKET`, `S3_KEY`).

use std::time::Instant;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{DEFAULT_CONFIG_PATH, load_config};
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::{RunMode, RunReport, run_monitor};

/// Lambda invocation payload. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Log instead of notifying and persist nothing
    #[serde(default)]
    pub dry_run: bool,

    /// Mark everything currently listed as seen without notifying
    #[serde(default)]
    pub baseline: bool,

    /// Override the per-run notification cap
    #[serde(default)]
    pub max_notifications: Option<usize>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct RunResponse {
    /// Whether the run finished without failure
    pub success: bool,

    /// Run report; absent when the run could not start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<RunRequest>,
) -> std::result::Result<RunResponse, LambdaError> {
    let start = Instant::now();
    let (request, _context) = event.into_parts();

    info!(
        "Starting run: dry_run={}, baseline={}, max_notifications={:?}",
        request.dry_run, request.baseline, request.max_notifications
    );

    let response = match execute(&request).await {
        Ok(report) => {
            if let Some(failure) = report_error(&report) {
                error!("Run failed: {failure}");
            } else {
                info!(
                    "Run completed: {} fetched, {} new, {} notified",
                    report.fetched, report.new, report.notified
                );
            }
            RunResponse {
                success: report.is_success(),
                error: report_error(&report),
                report: Some(report),
                execution_time_ms: elapsed_ms(start),
            }
        }
        Err(e) => {
            error!("Run could not start: {e}");
            RunResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: elapsed_ms(start),
                ..Default::default()
            }
        }
    };
    Ok(response)
}

async fn execute(request: &RunRequest) -> Result<RunReport> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = load_config(path)?;
    apply_request(&mut config, request);

    let mode = if request.baseline {
        RunMode::Baseline
    } else {
        RunMode::Notify
    };
    run_monitor(&config, mode).await
}

/// Fold per-invocation overrides into the loaded configuration.
fn apply_request(config: &mut Config, request: &RunRequest) {
    if request.dry_run {
        config.notifier.dry_run = true;
    }
    if let Some(cap) = request.max_notifications {
        config.run.max_notifications_per_run = Some(cap);
    }
}

fn report_error(report: &RunReport) -> Option<String> {
    match &report.status {
        crate::pipeline::RunStatus::Done => None,
        crate::pipeline::RunStatus::Failed { stage, error, .. } => {
            Some(format!("{stage}: {error}"))
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
