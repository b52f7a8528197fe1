use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use applyflow_cli::cli::{execute, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_appender = tracing_appender::rolling::daily("logs", "applyflow.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    tracing::debug!(build = env!("BUILD_DATE"), "applyflow starting");
    execute(Cli::parse()).await
}
