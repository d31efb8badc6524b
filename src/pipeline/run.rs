// src/pipeline/run.rs

//! Run orchestrator.
//!
//! One run walks `Idle → Fetching → Parsing → Diffing → Notifying →
//! Committing → Done`. A posting enters the seen state only after its
//! notification was confirmed; everything else about a failed run is left
//! for the next run to redo.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, NotifyError};
use crate::models::{CommitMode, Posting, Query};
use crate::pipeline::diff::{diff, merge_unique};
use crate::services::{Fetcher, ListingAdapter, Notifier, RawListing, RetryPolicy};
use crate::storage::{SeenState, StateStore};

const STEPS: usize = 5;

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Fetching,
    Parsing,
    Diffing,
    Notifying,
    Committing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Diffing => "diffing",
            Self::Notifying => "notifying",
            Self::Committing => "committing",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// What a run does with new postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Notify each new posting, then mark it seen
    #[default]
    Notify,
    /// Mark every new posting seen without notifying
    Baseline,
}

/// Final status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Failed {
        stage: RunStage,
        error: String,
        exit_code: u8,
    },
}

/// Counts and timings for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    #[serde(flatten)]
    pub status: RunStatus,
    pub queries: usize,
    /// Unique postings across all queries
    pub fetched: usize,
    /// Postings not in the seen state
    pub new: usize,
    pub notified: usize,
    /// Left for the next run by the per-run cap
    pub capped: usize,
    /// Not delivered because the notification stage stopped early
    pub undelivered: usize,
    /// Marked seen without notification (baseline)
    pub baselined: usize,
    /// Seen ids after the run
    pub seen_total: usize,
    pub persisted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetch_ms: u64,
    pub notify_ms: u64,
    pub duration_ms: u64,
}

impl RunReport {
    fn start(mode: RunMode, queries: usize) -> Self {
        let now = Utc::now();
        Self {
            mode,
            status: RunStatus::Done,
            queries,
            fetched: 0,
            new: 0,
            notified: 0,
            capped: 0,
            undelivered: 0,
            baselined: 0,
            seen_total: 0,
            persisted: false,
            started_at: now,
            finished_at: now,
            fetch_ms: 0,
            notify_ms: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Done
    }

    /// Stage the run failed in, if it failed.
    pub fn failed_stage(&self) -> Option<RunStage> {
        match &self.status {
            RunStatus::Done => None,
            RunStatus::Failed { stage, .. } => Some(*stage),
        }
    }

    /// Process exit code: `0` on success.
    pub fn exit_code(&self) -> u8 {
        match &self.status {
            RunStatus::Done => 0,
            RunStatus::Failed { exit_code, .. } => *exit_code,
        }
    }

    fn fail(&mut self, stage: RunStage, error: AppError) {
        log::error!("Run failed while {stage}: {error}");
        self.status = RunStatus::Failed {
            stage,
            error: error.to_string(),
            exit_code: error.exit_code(),
        };
    }

    /// Log the report as a summary block.
    pub fn log_summary(&self) {
        let status = match &self.status {
            RunStatus::Done => "done".to_string(),
            RunStatus::Failed { stage, error, .. } => format!("failed while {stage}: {error}"),
        };
        crate::utils::log::summary(
            "Run report",
            &[
                ("Status", status),
                ("Queries", self.queries.to_string()),
                ("Fetched", self.fetched.to_string()),
                ("New", self.new.to_string()),
                ("Notified", self.notified.to_string()),
                ("Capped", self.capped.to_string()),
                ("Undelivered", self.undelivered.to_string()),
                ("Baselined", self.baselined.to_string()),
                ("Seen total", self.seen_total.to_string()),
                ("Persisted", self.persisted.to_string()),
                ("Duration", format!("{} ms", self.duration_ms)),
            ],
        );
    }
}

/// Per-run policy.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub queries: Vec<Query>,
    pub mode: RunMode,
    pub fetch_policy: RetryPolicy,
    pub notify_policy: RetryPolicy,
    /// Pause between consecutive queries
    pub request_delay: Duration,
    /// `None` or `Some(0)` means unlimited
    pub max_notifications: Option<usize>,
    pub commit_mode: CommitMode,
    /// `false` for dry runs: nothing is written
    pub persist: bool,
}

impl RunOptions {
    pub fn new(queries: Vec<Query>) -> Self {
        Self {
            queries,
            mode: RunMode::Notify,
            fetch_policy: RetryPolicy::default(),
            notify_policy: RetryPolicy::default(),
            request_delay: Duration::ZERO,
            max_notifications: None,
            commit_mode: CommitMode::default(),
            persist: true,
        }
    }
}

/// Drives one run over the injected components.
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    adapter: Arc<dyn ListingAdapter>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        adapter: Arc<dyn ListingAdapter>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
        options: RunOptions,
    ) -> Self {
        Self {
            fetcher,
            adapter,
            notifier,
            store,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute one run. Failures are reported in the returned report.
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::start(self.options.mode, self.options.queries.len());

        let mut state = self.store.load().await;
        log::info!(
            "Loaded {} seen ids from {}",
            state.len(),
            self.store.location()
        );

        if let Err(stage) = self.run_stages(&mut state, &mut report).await {
            log::debug!("Run stopped at {stage}");
        }

        report.seen_total = state.len();
        report.finished_at = Utc::now();
        report.duration_ms = elapsed_ms(started);
        report
    }

    async fn run_stages(
        &self,
        state: &mut SeenState,
        report: &mut RunReport,
    ) -> Result<(), RunStage> {
        // Fetching
        crate::utils::log::step(1, STEPS, "Fetching listings");
        let fetch_started = Instant::now();
        let pages = self.fetch_all().await;
        report.fetch_ms = elapsed_ms(fetch_started);
        let pages = pages.map_err(|e| {
            report.fail(RunStage::Fetching, e);
            RunStage::Fetching
        })?;

        // Parsing
        crate::utils::log::step(2, STEPS, "Parsing listings");
        let fetched = self.parse_all(&pages).map_err(|e| {
            report.fail(RunStage::Parsing, e);
            RunStage::Parsing
        })?;
        report.fetched = fetched.len();

        // Diffing
        crate::utils::log::step(3, STEPS, "Comparing with seen postings");
        let mut new_postings = diff(&fetched, state);
        report.new = new_postings.len();
        for posting in &fetched {
            state.touch(&posting.id);
        }
        crate::utils::log::sub_item(&format!(
            "{} fetched, {} new, {} already seen",
            fetched.len(),
            new_postings.len(),
            fetched.len() - new_postings.len()
        ));

        // Notifying
        let mut notify_failure = None;
        match self.options.mode {
            RunMode::Baseline => {
                crate::utils::log::step(4, STEPS, "Baseline: marking postings seen");
                for posting in &new_postings {
                    state.insert(posting.id.clone());
                }
                report.baselined = new_postings.len();
            }
            RunMode::Notify => {
                if let Some(limit) = self.options.max_notifications.filter(|n| *n > 0) {
                    if new_postings.len() > limit {
                        report.capped = new_postings.len() - limit;
                        new_postings.truncate(limit);
                        log::warn!(
                            "Per-run cap of {limit} reached; {} postings left for the next run",
                            report.capped
                        );
                    }
                }

                crate::utils::log::step(
                    4,
                    STEPS,
                    &format!("Notifying {} postings", new_postings.len()),
                );
                let notify_started = Instant::now();
                let outcome = self.notify_all(&new_postings, state, report).await;
                report.notify_ms = elapsed_ms(notify_started);
                match outcome {
                    Ok(()) => {}
                    Err(NotifyStop::Notify(e)) => notify_failure = Some(e),
                    Err(NotifyStop::Commit(e)) => {
                        report.fail(RunStage::Committing, e);
                        return Err(RunStage::Committing);
                    }
                }
            }
        }

        // Committing
        crate::utils::log::step(5, STEPS, "Committing state");
        state.set_last_run_at(Utc::now());
        if self.options.persist {
            match self.store.save(state).await {
                Ok(()) => {
                    report.persisted = true;
                    crate::utils::log::sub_item(&format!(
                        "Saved {} seen ids to {}",
                        state.len(),
                        self.store.location()
                    ));
                }
                Err(e) => {
                    if let Some(notify_err) = notify_failure {
                        log::error!("Commit after failed notification also failed: {e}");
                        report.fail(RunStage::Notifying, notify_err.into());
                        return Err(RunStage::Notifying);
                    }
                    report.fail(RunStage::Committing, e.into());
                    return Err(RunStage::Committing);
                }
            }
        } else {
            crate::utils::log::sub_item("Dry run: state not persisted");
        }

        if let Some(e) = notify_failure {
            report.fail(RunStage::Notifying, e.into());
            return Err(RunStage::Notifying);
        }

        log::info!("Run complete");
        Ok(())
    }

    /// Fetch every query, pausing between requests.
    async fn fetch_all(&self) -> Result<Vec<RawListing>, AppError> {
        let mut pages = Vec::with_capacity(self.options.queries.len());
        for (i, query) in self.options.queries.iter().enumerate() {
            if i > 0 && !self.options.request_delay.is_zero() {
                tokio::time::sleep(self.options.request_delay).await;
            }
            crate::utils::log::sub_item(&format!("Searching {query}"));
            let label = format!("fetch {query}");
            let page = self
                .options
                .fetch_policy
                .run(&label, || self.fetcher.fetch(query))
                .await?;
            pages.push(page);
        }
        Ok(pages)
    }

    fn parse_all(&self, pages: &[RawListing]) -> Result<Vec<Posting>, AppError> {
        let mut batches = Vec::with_capacity(pages.len());
        for page in pages {
            let parsed = self.adapter.parse(page)?;
            if parsed.skipped > 0 {
                log::warn!(
                    "{}: skipped {} malformed entries for {}",
                    self.adapter.name(),
                    parsed.skipped,
                    page.query
                );
            }
            crate::utils::log::sub_item(&format!(
                "{}: {} postings",
                page.query,
                parsed.postings.len()
            ));
            batches.push(parsed.postings);
        }
        Ok(merge_unique(batches))
    }

    /// Deliver postings in order; each confirmed posting is marked seen.
    ///
    /// Stops at the first posting that cannot be delivered.
    async fn notify_all(
        &self,
        postings: &[Posting],
        state: &mut SeenState,
        report: &mut RunReport,
    ) -> Result<(), NotifyStop> {
        let incremental = self.options.persist && self.options.commit_mode == CommitMode::Incremental;

        for (i, posting) in postings.iter().enumerate() {
            let label = format!("notify {}", posting.id);
            let sent = self
                .options
                .notify_policy
                .run(&label, || self.notifier.notify(posting))
                .await;

            if let Err(e) = sent {
                report.undelivered = postings.len() - i;
                if e.is_fatal() {
                    log::error!("Notification target rejected; stopping notifications");
                }
                return Err(NotifyStop::Notify(e));
            }

            state.insert(posting.id.clone());
            report.notified += 1;

            if incremental {
                self.store
                    .save(state)
                    .await
                    .map_err(|e| NotifyStop::Commit(e.into()))?;
                report.persisted = true;
            }
        }
        Ok(())
    }
}

enum NotifyStop {
    Notify(NotifyError),
    Commit(AppError),
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
