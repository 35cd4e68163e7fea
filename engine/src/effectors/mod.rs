//! Effectors
//!
//! One handler per action type. An effector performs a single mutation or
//! external call and answers with a short status line. Failures come back as
//! [`EffectorError`]; the dispatcher turns them into `"Error: ..."` results so
//! one bad action never stops the rest of a plan.

pub mod calendar;
pub mod finance;
pub mod tasks;

pub use calendar::CalendarShield;
pub use finance::FinanceSweep;
pub use tasks::{AddProject, AddTask, CompleteTask};

use crate::config::Config;
use crate::db::StateStore;
use crate::secrets::{self, SecretSource};
use async_trait::async_trait;
use sdk::types::{Action, ActionType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Errors an effector can report for one action
#[derive(Debug, thiserror::Error)]
pub enum EffectorError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("{service} API returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    #[error("state store failure: {0}")]
    Store(String),
}

impl EffectorError {
    /// Transport failure talking to `service`. Error text is scrubbed of
    /// credentials before it can reach a result line.
    pub fn network(service: &'static str, e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else {
            secrets::scrub(&e.to_string())
        };
        EffectorError::Network { service, message }
    }
}

impl From<anyhow::Error> for EffectorError {
    fn from(e: anyhow::Error) -> Self {
        EffectorError::Store(format!("{:#}", e))
    }
}

/// HTTP client for an external effector, every request bounded by `timeout`
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build effector HTTP client, using defaults: {}", e);
            reqwest::Client::new()
        })
}

/// Handler for one action type
#[async_trait]
pub trait Effector: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, action: &Action) -> Result<String, EffectorError>;
}

/// Fixed acknowledgement with no side effects
pub struct Acknowledge {
    message: &'static str,
}

impl Acknowledge {
    pub const COGNITIVE_RESET: &'static str = "Cognitive reset acknowledged";
    pub const NO_ACTION: &'static str = "No action taken";

    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl Effector for Acknowledge {
    fn name(&self) -> &str {
        "acknowledge"
    }

    async fn apply(&self, _action: &Action) -> Result<String, EffectorError> {
        Ok(self.message.to_string())
    }
}

/// Effectors keyed by action type
///
/// Unknown types never reach a registered handler; they always resolve to the
/// no-op acknowledgement.
pub struct EffectorRegistry {
    effectors: HashMap<ActionType, Arc<dyn Effector>>,
    fallback: Arc<dyn Effector>,
}

impl EffectorRegistry {
    /// Registry with only the no-op fallback
    pub fn empty() -> Self {
        Self {
            effectors: HashMap::new(),
            fallback: Arc::new(Acknowledge::new(Acknowledge::NO_ACTION)),
        }
    }

    /// The standard handler for every known action type
    pub fn with_defaults(
        config: &Config,
        store: Arc<dyn StateStore>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        let mut registry = Self::empty();

        for kind in ActionType::KNOWN {
            let effector: Arc<dyn Effector> = match &kind {
                ActionType::AddTask => Arc::new(AddTask::new(store.clone())),
                ActionType::CompleteTask => Arc::new(CompleteTask::new(store.clone())),
                ActionType::AddProject => Arc::new(AddProject::new(store.clone())),
                ActionType::CalendarShield => Arc::new(CalendarShield::new(
                    config.calendar.clone(),
                    secrets.clone(),
                    http_client(config.calendar.timeout()),
                )),
                ActionType::FinanceSweep => Arc::new(FinanceSweep::new(
                    config.payments.clone(),
                    secrets.clone(),
                    http_client(config.payments.timeout()),
                )),
                ActionType::CognitiveReset => {
                    Arc::new(Acknowledge::new(Acknowledge::COGNITIVE_RESET))
                }
                ActionType::NoAction | ActionType::Unknown(_) => {
                    Arc::new(Acknowledge::new(Acknowledge::NO_ACTION))
                }
            };
            registry.register(kind, effector);
        }

        registry
    }

    /// Register (or replace) the handler for a known action type.
    /// Registrations for unknown tags are ignored.
    pub fn register(&mut self, kind: ActionType, effector: Arc<dyn Effector>) {
        if !kind.is_known() {
            debug!("Ignoring effector registration for unknown type {}", kind);
            return;
        }
        self.effectors.insert(kind, effector);
    }

    pub fn resolve(&self, kind: &ActionType) -> Arc<dyn Effector> {
        self.effectors
            .get(kind)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
