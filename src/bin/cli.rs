//! Seek monitor CLI
//!
//! Local and cron entry point. For AWS Lambda, use `seek-monitor-lambda`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use seek_monitor::{
    config,
    error::Result,
    models::Config,
    pipeline::{self, RunMode, RunReport},
    storage::StateStore,
};

/// seek-monitor - notifies about new job postings
#[derive(Parser, Debug)]
#[command(
    name = "seek-monitor",
    version,
    about = "Watches a Seek job search and notifies about new postings"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, diff, notify new postings and commit them
    Run {
        /// Log notifications instead of sending them; persist nothing
        #[arg(long)]
        dry_run: bool,

        /// Notify at most this many postings (0 = unlimited)
        #[arg(long)]
        max_notifications: Option<usize>,
    },

    /// Mark every currently listed posting as seen without notifying
    Baseline,

    /// Validate configuration
    Validate,

    /// Show effective configuration and state
    Info,
}

/// Initialize logging; `RUST_LOG` wins over the configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    config::load_dotenv();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose, "info");
            log::error!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };
    init_logging(cli.verbose, &config.logging.level);

    match execute(cli.command, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(command: Command, mut config: Config) -> Result<u8> {
    match command {
        Command::Run {
            dry_run,
            max_notifications,
        } => {
            if dry_run {
                config.notifier.dry_run = true;
            }
            if let Some(cap) = max_notifications {
                config.run.max_notifications_per_run = Some(cap);
            }
            let report = pipeline::run_monitor(&config, RunMode::Notify).await?;
            Ok(finish(&report))
        }

        Command::Baseline => {
            let report = pipeline::run_monitor(&config, RunMode::Baseline).await?;
            Ok(finish(&report))
        }

        Command::Validate => {
            config.validate()?;
            log::info!("Configuration is valid");
            for query in config.search.queries() {
                log::info!("  Query: {query}");
            }
            Ok(0)
        }

        Command::Info => {
            seek_monitor::utils::log::summary("Configuration", &pipeline::describe(&config));

            let store = pipeline::build_store(&config).await?;
            let state = store.load().await;
            seek_monitor::utils::log::summary(
                "State",
                &[
                    ("Location", store.location()),
                    ("Seen ids", format!("{}/{}", state.len(), state.capacity())),
                    (
                        "Last run",
                        state
                            .last_run_at()
                            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
                    ),
                ],
            );
            Ok(0)
        }
    }
}

fn finish(report: &RunReport) -> u8 {
    if report.is_success() {
        match report.mode {
            RunMode::Notify => log::info!("Done: {} new postings notified", report.notified),
            RunMode::Baseline => log::info!("Done: {} postings marked seen", report.baselined),
        }
    }
    report.exit_code()
}
