//! AWS Lambda entry point for the Seek monitor
//!
//! Deploy with `cargo lambda build --release --features lambda`
//! and attach a schedule rule (e.g. `rate(30 minutes)`).

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seek_monitor::{config, lambda};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    config::load_dotenv();

    // `log` records from the library are bridged into this subscriber.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Seek monitor Lambda starting...");
    lambda_runtime::run(service_fn(lambda::handler)).await
}
