//! Action Dispatcher
//!
//! Runs a validated plan's actions in order against the effector registry.

use crate::effectors::{EffectorError, EffectorRegistry};
use sdk::types::{Action, Plan};
use tracing::{debug, warn};

pub struct Dispatcher {
    registry: EffectorRegistry,
}

impl Dispatcher {
    pub fn new(registry: EffectorRegistry) -> Self {
        Self { registry }
    }

    pub async fn dispatch_one(&self, action: &Action) -> Result<String, EffectorError> {
        let effector = self.registry.resolve(&action.action_type);
        debug!(
            "Dispatching {} to {} with value '{}'",
            action.action_type,
            effector.name(),
            action.value
        );
        effector.apply(action).await
    }

    /// One result line per action, in plan order. A failing action yields
    /// `"Error: <message>"` and the remaining actions still run.
    pub async fn dispatch(&self, plan: &Plan) -> Vec<String> {
        let mut results = Vec::with_capacity(plan.actions.len());

        for (i, action) in plan.actions.iter().enumerate() {
            let line = match self.dispatch_one(action).await {
                Ok(line) => line,
                Err(e) => {
                    warn!("Action {} ({}) failed: {}", i, action.action_type, e);
                    format!("Error: {}", e)
                }
            };
            results.push(line);
        }

        results
    }
}
