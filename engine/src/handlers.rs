//! Command handlers for CLI operations
//!
//! - serve: HTTP API plus the intent queue scheduler until Ctrl-C
//! - run: one command through the pipeline
//! - status: score the context snapshot
//! - memory: recent memory records

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::api;
use crate::conductor::{CommandOutcome, Conductor, PipelineError, Scheduler};
use crate::config::Config;
use crate::db::{self, StateStore};
use crate::secrets::{self, ChainedSecrets, EnvSecrets, FileSecrets, SecretSource};
use sdk::errors::EngineError;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Environment first, then the credentials file. The file is re-read on
/// each lookup, so a running server picks up a key written to it later.
fn secret_source(config: &Config) -> Arc<dyn SecretSource> {
    Arc::new(ChainedSecrets::new(vec![
        Arc::new(EnvSecrets),
        Arc::new(FileSecrets::new(config.credentials_path())),
    ]))
}

async fn build(config: &Config) -> Result<(Arc<Conductor>, Arc<dyn StateStore>)> {
    let store = db::open_store(config).await?;
    let conductor = Conductor::from_config(config, store.clone(), secret_source(config));
    Ok((Arc::new(conductor), store))
}

async fn flush(store: &Arc<dyn StateStore>) {
    if let Err(e) = store.flush().await {
        tracing::error!("Failed to flush state store: {:#}", e);
    }
}

/// Serve the HTTP API and drain the intent queue in the background
pub async fn handle_serve(config: &Config, bind: Option<String>) -> Result<()> {
    let (conductor, store) = build(config).await?;

    if !conductor.is_configured() {
        tracing::warn!(
            "OPENAI_API_KEY is not set in the environment or {}; commands will be queued until it is",
            config.credentials_path().display()
        );
    }

    let scheduler = Scheduler::new(
        conductor.clone(),
        Duration::from_secs(config.scheduler.drain_interval_secs),
    )
    .spawn();

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let served = api::serve(&bind, conductor, &config.server.allowed_origins, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await;

    scheduler.stop().await;
    flush(&store).await;
    served
}

/// Run a command immediately
pub async fn handle_run(command: String, config: &Config, format: OutputFormat) -> Result<()> {
    let (conductor, store) = build(config).await?;

    let outcome = conductor.submit(&command).await;
    flush(&store).await;

    match (outcome, format) {
        (Ok(CommandOutcome::Executed(execution)), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
        (Ok(CommandOutcome::Executed(execution)), OutputFormat::Text) => {
            println!("Intent: {}", execution.intent);
            if execution.result.is_empty() {
                println!("No actions.");
            }
            for (action, line) in execution.actions.iter().zip(&execution.result) {
                println!("  [{}] {}", action.action_type, line);
            }
        }
        (Ok(CommandOutcome::Queued(_)), _) => {
            return Err(EngineError::NotConfigured(secrets::OPENAI_API_KEY.to_string()).into());
        }
        (Err(PipelineError::Invalid(e)), OutputFormat::Json) => {
            let output = json!({ "error": e.to_string(), "raw": e.raw() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        (Err(PipelineError::Generation(e)), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&api::degraded_execution(&e))?);
        }
        (Err(PipelineError::Invalid(e)), OutputFormat::Text) => {
            println!("{}", e);
            println!("Raw response: {}", e.raw());
        }
        (Err(e), _) => return Err(EngineError::from(e).into()),
    }

    Ok(())
}

/// Evaluate the current context snapshot
pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let (conductor, store) = build(config).await?;
    let report = conductor.status().await;
    flush(&store).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Score:  {}", report.score);
            println!("  Health: {}", report.health_index);
            println!("  Wealth: {}", report.wealth_index);
            println!("  Focus:  {}", report.focus_index);
            println!();
            println!("{}", report.insight);

            if !report.pending_actions.is_empty() {
                println!();
                println!("Suggested actions:");
                for action in &report.pending_actions {
                    let priority = action.priority.as_deref().unwrap_or("normal");
                    println!("  {} {} ({})", action.action_type, action.target, priority);
                    if let Some(description) = &action.description {
                        println!("    {}", description);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Show the most recent memory records
pub async fn handle_memory(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let store = db::open_store(config).await?;
    let records = store
        .recent_memory(limit)
        .await
        .context("Failed to fetch memory records")?;

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No memory records");
                return Ok(());
            }

            println!("Memory (last {} records):", limit);
            println!();

            for record in records {
                let created = chrono::DateTime::from_timestamp(record.created_at, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "Unknown".to_string());

                println!("#{} {}", record.id, created);
                println!("  Command: {}", record.command);
                println!("  Result:  {}", record.result);
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "memory": records,
                "count": records.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
