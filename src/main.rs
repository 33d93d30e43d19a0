//! Switchyard - Inference Request Router
//!
//! CLI entry point: routes tasks across rate-limited, budget-metered and
//! local inference providers.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod app;
mod cli;

const DEFAULT_LOG_FILTER: &str = "switchyard=info,switchyard_llm=info,switchyard_core=info";

/// Install the tracing subscriber
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// The returned guard flushes the log file on drop.
fn init_logging(config: &app::config::LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let stderr_layer = if config.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "switchyard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = app::load_config()?;
    let _guard = init_logging(&config.logging);

    cli::run(cli, config).await
}
