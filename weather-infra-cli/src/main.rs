use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::{Args, Command};

/// Initialize tracing:
/// 1. Console output (stderr), so stdout stays clean for plans and JSON
/// 2. Optional file output under $WEATHER_INFRA_LOG_DIR/deploy.log
///
/// The returned guard must stay alive for file logging to flush.
fn initialize_tracing() -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,weather_infra=debug,weather_infra_cli=debug".into());

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match std::env::var("WEATHER_INFRA_LOG_DIR") {
        Ok(dir) => {
            let dir = PathBuf::from(dir);
            std::fs::create_dir_all(&dir)?;
            let file_appender = tracing_appender::rolling::never(&dir, "deploy.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(file_writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let _guard = initialize_tracing()?;

    let stack = args.stack;
    let config_file = args.config_file;

    match args.command {
        Command::Plan { output } => {
            commands::deploy::run_plan(&stack, config_file.as_deref(), &output).await
        }
        Command::Names => commands::system::names(&stack, config_file.as_deref()),
        Command::Config { show_secrets } => {
            commands::system::config(&stack, config_file.as_deref(), show_secrets)
        }
        Command::Simulate { runs, output } => {
            commands::deploy::run_simulate(&stack, config_file.as_deref(), runs, &output).await
        }
    }
}
