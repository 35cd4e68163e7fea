//! Conductor
//!
//! The intent-to-action pipeline. A command is turned into a plan by the
//! model, validated, dispatched to the effectors and recorded in the memory
//! log. While the model is unconfigured commands wait in the intent queue
//! until the scheduler drains them through the same path.

pub mod context;
pub mod executor;
pub mod planner;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod validator;

pub use context::PromptSet;
pub use executor::Dispatcher;
pub use planner::{GenerationError, PlanGenerator};
pub use queue::{IntentQueue, QueuedIntent};
pub use retry::{Clock, RecordingClock, RetryPolicy, TokioClock};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use validator::{validate_plan, validate_status, PlanError};

use crate::config::Config;
use crate::db::StateStore;
use crate::effectors::EffectorRegistry;
use crate::llm::openai::OpenAIProvider;
use crate::llm::LLMProvider;
use crate::secrets::SecretSource;
use sdk::errors::EngineError;
use sdk::types::{ActionRequest, MemoryRecord, Plan, StatusReport};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a command produced no plan
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("command is empty")]
    EmptyCommand,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Invalid(#[from] PlanError),
}

impl From<PipelineError> for EngineError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::EmptyCommand => EngineError::InvalidRequest("command is empty".to_string()),
            PipelineError::Generation(GenerationError::NotConfigured(key)) => {
                EngineError::NotConfigured(key)
            }
            PipelineError::Generation(GenerationError::Timeout(_)) => EngineError::LLMTimeout,
            PipelineError::Generation(e @ GenerationError::Provider { .. }) => {
                EngineError::LLMProvider(e.to_string())
            }
            PipelineError::Invalid(e) => EngineError::MalformedResponse {
                raw: e.raw().to_string(),
            },
        }
    }
}

/// A plan that went through dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    pub intent: String,
    pub actions: Vec<sdk::types::Action>,
    pub result: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Executed(Execution),
    Queued(QueuedIntent),
}

/// Result of a single direct action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub status: &'static str,
    pub execution_log: String,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == "executed"
    }
}

/// What one drain cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

impl DrainReport {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.requeued == 0 && self.dead_lettered == 0
    }
}

pub struct Conductor {
    generator: PlanGenerator,
    dispatcher: Dispatcher,
    store: Arc<dyn StateStore>,
    queue: IntentQueue,
    prompts: PromptSet,
    memory_window: usize,
    max_failures: u32,
}

impl Conductor {
    pub fn new(
        generator: PlanGenerator,
        dispatcher: Dispatcher,
        store: Arc<dyn StateStore>,
        prompts: PromptSet,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            store,
            queue: IntentQueue::new(),
            prompts,
            memory_window: 10,
            max_failures: 5,
        }
    }

    /// Number of past exchanges rendered into command prompts
    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window;
        self
    }

    /// Failures after which a queued command is dead-lettered
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    /// Wire the standard pipeline: OpenAI-compatible provider, default
    /// effectors, prompts resolved from config and environment.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn StateStore>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self::from_config_with_clock(config, store, secrets, Arc::new(TokioClock))
    }

    pub fn from_config_with_clock(
        config: &Config,
        store: Arc<dyn StateStore>,
        secrets: Arc<dyn SecretSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let provider: Arc<dyn LLMProvider> =
            Arc::new(OpenAIProvider::new(config.llm.clone(), secrets.clone()));
        let generator = PlanGenerator::new(
            provider,
            RetryPolicy::from(&config.retry),
            config.llm.timeout(),
        )
        .with_clock(clock);

        let registry = EffectorRegistry::with_defaults(config, store.clone(), secrets.clone());
        let prompts = PromptSet::resolve(config.llm.system_instruction.as_deref(), secrets.as_ref());

        Self::new(generator, Dispatcher::new(registry), store, prompts)
            .with_memory_window(config.llm.memory_window)
            .with_max_failures(config.scheduler.max_failures)
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn queue(&self) -> &IntentQueue {
        &self.queue
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    /// Entry point for a new command: run it now, or queue it when the
    /// generator is not configured.
    pub async fn submit(&self, command: &str) -> Result<CommandOutcome, PipelineError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(PipelineError::EmptyCommand);
        }

        if !self.generator.is_configured() {
            let entry = self.queue.enqueue(command).await;
            info!(
                "Generator not configured, queued command {} ({} pending)",
                entry.id,
                self.queue.len().await
            );
            return Ok(CommandOutcome::Queued(entry));
        }

        self.process(command).await.map(CommandOutcome::Executed)
    }

    /// Generate, validate, dispatch and record one command
    pub async fn process(&self, command: &str) -> Result<Execution, PipelineError> {
        let memory = match self.store.recent_memory(self.memory_window).await {
            Ok(memory) => memory,
            Err(e) => {
                warn!("Could not load recent memory, continuing without it: {:#}", e);
                Vec::new()
            }
        };

        let messages = self.prompts.command_messages(&memory, command);
        let raw = self.generator.generate(&messages).await.map_err(|e| {
            warn!("Plan generation failed: {}", e);
            e
        })?;

        let plan = validate_plan(&raw).map_err(|e| {
            warn!("Rejected model output: {}", e.reason());
            e
        })?;

        debug!("Plan '{}' with {} action(s)", plan.intent, plan.actions.len());
        let results = self.dispatcher.dispatch(&plan).await;
        self.record(command, &plan, &results).await;

        Ok(Execution {
            intent: plan.intent,
            actions: plan.actions,
            result: results,
        })
    }

    async fn record(&self, command: &str, plan: &Plan, results: &[String]) {
        let plan_json = serde_json::to_string(plan).unwrap_or_default();
        let result_json = serde_json::to_string(results).unwrap_or_default();

        if let Err(e) = self
            .store
            .append_memory(command, &plan_json, &result_json)
            .await
        {
            error!("Failed to write memory record for '{}': {:#}", command, e);
        }
    }

    /// Score the current context snapshot. Never fails: any problem yields
    /// the neutral degraded report.
    pub async fn status(&self) -> StatusReport {
        let snapshot = match self.store.context_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to read context snapshot: {:#}", e);
                return StatusReport::degraded("Life metrics are unavailable right now");
            }
        };

        let messages = self.prompts.status_messages(&snapshot);
        let raw = match self.generator.generate(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Status generation failed: {}", e);
                return StatusReport::degraded(e.insight());
            }
        };

        let report = match validate_status(&raw) {
            Ok(report) => report,
            Err(e) => {
                warn!("Rejected status output: {}", e.reason());
                return StatusReport::degraded(e.to_string());
            }
        };

        if let Err(e) = self.store.log_history(report.score, &report.insight).await {
            error!("Failed to record status history: {:#}", e);
        }

        report
    }

    /// Run one action directly, bypassing the model
    pub async fn execute_action(&self, request: ActionRequest) -> ActionOutcome {
        let action = request.into_action();
        match self.dispatcher.dispatch_one(&action).await {
            Ok(line) => ActionOutcome {
                status: "executed",
                execution_log: line,
            },
            Err(e) => {
                warn!("Direct {} failed: {}", action.action_type, e);
                ActionOutcome {
                    status: "failed",
                    execution_log: format!("Error: {}", e),
                }
            }
        }
    }

    /// Merge raw metric values into the context snapshot. Strings are stored
    /// as-is, other JSON values in their JSON text form. Returns the keys that
    /// were updated.
    pub async fn ingest(
        &self,
        metrics: serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<Vec<String>> {
        let entries: Vec<(String, String)> = metrics
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();

        let keys = entries.iter().map(|(k, _)| k.clone()).collect();
        self.store.merge_context(entries).await?;
        Ok(keys)
    }

    pub async fn recent_memory(&self, limit: usize) -> anyhow::Result<Vec<MemoryRecord>> {
        self.store.recent_memory(limit).await
    }

    /// Work through the intent queue once. Does nothing while the generator
    /// is unconfigured. Stops at the first failure: the entry goes back to
    /// the head, or to the dead-letter list once it has failed
    /// `max_failures` times.
    pub async fn drain_queue(&self) -> DrainReport {
        let mut report = DrainReport::default();

        if !self.generator.is_configured() {
            return report;
        }

        while let Some(mut entry) = self.queue.pop_front().await {
            match self.process(&entry.command).await {
                Ok(execution) => {
                    info!(
                        "Drained queued command {} ({} action(s))",
                        entry.id,
                        execution.result.len()
                    );
                    report.processed += 1;
                }
                Err(e) => {
                    entry.failures += 1;
                    entry.last_error = Some(e.to_string());

                    if entry.failures >= self.max_failures {
                        warn!(
                            "Queued command {} failed {} times, moving to dead letters: {}",
                            entry.id, entry.failures, e
                        );
                        self.queue.dead_letter(entry).await;
                        report.dead_lettered += 1;
                    } else {
                        debug!(
                            "Queued command {} failed ({}/{}), back to head",
                            entry.id, entry.failures, self.max_failures
                        );
                        self.queue.requeue_front(entry).await;
                        report.requeued += 1;
                    }
                    break;
                }
            }
        }

        report
    }
}
