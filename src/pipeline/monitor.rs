// src/pipeline/monitor.rs

//! Monitor entry point: wires configured components into an orchestrator.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;

use crate::error::{AppError, Result};
use crate::models::{Config, StateBackend};
use crate::pipeline::run::{Orchestrator, RunMode, RunOptions, RunReport};
use crate::services::{
    HttpFetcher, ListingAdapter, LogNotifier, Notifier, SeekAdapter, TelegramNotifier,
};
use crate::storage::{LocalStateStore, RunLock, StateStore};

/// Run the monitor once.
///
/// Configuration problems and a held run lock are returned as errors before
/// any network call; everything after that is reported in the [`RunReport`].
pub async fn run_monitor(config: &Config, mode: RunMode) -> Result<RunReport> {
    let dry_run = config.notifier.dry_run;
    config.validate_for(mode == RunMode::Notify && !dry_run)?;

    crate::utils::log::header(match (mode, dry_run) {
        (RunMode::Baseline, _) => "SEEK MONITOR: BASELINE",
        (RunMode::Notify, true) => "SEEK MONITOR: DRY RUN",
        (RunMode::Notify, false) => "SEEK MONITOR",
    });

    let _lock = if config.state.lock && config.state.backend == StateBackend::Local && !dry_run {
        Some(RunLock::acquire(
            config.state.lock_path(),
            Duration::from_secs(config.state.lock_stale_secs),
        )?)
    } else {
        None
    };

    let adapter: Arc<dyn ListingAdapter> = Arc::new(SeekAdapter::new(
        &config.fetcher.base_url,
        config.selectors.clone(),
    )?);
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher, adapter.clone())?);
    let notifier: Arc<dyn Notifier> = if dry_run || mode == RunMode::Baseline {
        Arc::new(LogNotifier)
    } else {
        Arc::new(TelegramNotifier::new(&config.notifier)?)
    };
    let store = build_store(config).await?;

    let options = run_options(config, mode);
    let orchestrator = Orchestrator::new(fetcher, adapter, notifier, store, options);
    let report = orchestrator.run().await;
    report.log_summary();
    Ok(report)
}

/// Per-run policy derived from configuration.
pub fn run_options(config: &Config, mode: RunMode) -> RunOptions {
    RunOptions {
        queries: config.search.queries(),
        mode,
        fetch_policy: config.fetcher.retry_policy(),
        notify_policy: config.notifier.retry_policy(),
        request_delay: Duration::from_millis(config.fetcher.request_delay_ms),
        max_notifications: config.run.max_notifications_per_run.filter(|n| *n > 0),
        commit_mode: config.run.commit_mode,
        persist: !config.notifier.dry_run,
    }
}

/// State store for the configured backend.
pub async fn build_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    match config.state.backend {
        StateBackend::Local => Ok(Arc::new(LocalStateStore::new(
            &config.state.path,
            config.state.capacity,
        ))),
        StateBackend::S3 => build_s3_store(config).await,
    }
}

#[cfg(feature = "s3")]
async fn build_s3_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    let bucket = config
        .state
        .s3_bucket
        .as_deref()
        .ok_or_else(|| AppError::config("state.s3_bucket is not set"))?;
    let store = crate::storage::S3StateStore::from_env(
        bucket,
        config.state.s3_key.as_str(),
        config.state.capacity,
    )
    .await;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "s3"))]
async fn build_s3_store(_config: &Config) -> Result<Arc<dyn StateStore>> {
    Err(AppError::config(
        "state.backend = \"s3\" needs a build with the `s3` feature",
    ))
}

/// Effective configuration as key/value pairs, secrets redacted.
pub fn describe(config: &Config) -> Vec<(&'static str, String)> {
    let set_or = |present: bool| (if present { "set" } else { "not set" }).to_string();
    let state_location = match config.state.backend {
        StateBackend::Local => config.state.path.display().to_string(),
        StateBackend::S3 => format!(
            "s3://{}/{}",
            config.state.s3_bucket.as_deref().unwrap_or("?"),
            config.state.s3_key
        ),
    };

    vec![
        ("Keywords", config.search.keywords.join(", ")),
        ("Location", config.search.location.clone()),
        ("Source", config.fetcher.base_url.clone()),
        (
            "Proxy",
            set_or(
                config
                    .fetcher
                    .proxy_url
                    .as_ref()
                    .is_some_and(|p| !p.expose_secret().is_empty()),
            ),
        ),
        (
            "Fetch retries",
            format!(
                "{} attempts, {}s base delay",
                config.fetcher.max_attempts, config.fetcher.retry_delay_secs
            ),
        ),
        ("Notification target", set_or(config.notifier.target().is_some())),
        ("Notification credential", set_or(config.notifier.credential().is_some())),
        ("Dry run", config.notifier.dry_run.to_string()),
        ("State", state_location),
        ("State capacity", config.state.capacity.to_string()),
        (
            "Per-run cap",
            config
                .run
                .max_notifications_per_run
                .filter(|n| *n > 0)
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string()),
        ),
        ("Commit mode", format!("{:?}", config.run.commit_mode)),
    ]
}
