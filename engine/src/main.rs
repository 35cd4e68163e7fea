// LifeOS intent engine
// Main entry point for the lifeos binary

use clap::Parser;
use lifeos_engine::cli::{Cli, Command};
use lifeos_engine::config::Config;
use lifeos_engine::handlers::{
    handle_memory, handle_run, handle_serve, handle_status, OutputFormat,
};
use lifeos_engine::telemetry::init_telemetry_with_level;
use sdk::errors::{EngineError, LifeOsErrorExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = &result {
        if let Some(engine_error) = e.downcast_ref::<EngineError>() {
            eprintln!("Hint: {}", engine_error.user_hint());
        }
    }

    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::info!(
        "LifeOS v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Serve { bind } => handle_serve(&config, bind).await,
        Command::Run { command } => handle_run(command, &config, format).await,
        Command::Status => handle_status(&config, format).await,
        Command::Memory { limit } => handle_memory(limit, &config, format).await,
    }
}
