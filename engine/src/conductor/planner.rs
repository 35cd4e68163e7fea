//! Plan Generator
//!
//! Wraps the model provider with a per-attempt timeout and the retry policy.
//! It never writes state; callers decide what a failure means for them.

use super::retry::{Clock, RetryPolicy, TokioClock};
use crate::llm::{LLMError, LLMProvider, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("plan generator is not configured ({0})")]
    NotConfigured(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model provider failed after {attempts} attempt(s): {source}")]
    Provider {
        attempts: u32,
        #[source]
        source: LLMError,
    },
}

impl GenerationError {
    /// Human-readable explanation used in degraded responses
    pub fn insight(&self) -> String {
        format!("AI generation unavailable: {}", self)
    }
}

pub struct PlanGenerator {
    provider: Arc<dyn LLMProvider>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl PlanGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            provider,
            retry,
            clock: Arc::new(TokioClock),
            timeout,
        }
    }

    /// Replace the clock used for backoff sleeps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    async fn attempt(&self, messages: &[Message]) -> Result<String, LLMError> {
        match tokio::time::timeout(self.timeout, self.provider.generate(messages)).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout),
        }
    }

    /// Ask the model for a JSON answer. Transient HTTP failures are retried;
    /// anything else, including a timeout, ends the call at once.
    pub async fn generate(&self, messages: &[Message]) -> Result<String, GenerationError> {
        if !self.provider.is_configured() {
            return Err(GenerationError::NotConfigured(
                self.provider.name().to_string(),
            ));
        }

        let mut attempts = 0;
        let result = self
            .retry
            .run(
                self.clock.as_ref(),
                |n| {
                    attempts = n;
                    debug!("Model request attempt {} via {}", n, self.provider.name());
                    self.attempt(messages)
                },
                LLMError::is_transient,
            )
            .await;

        match result {
            Ok(text) => {
                info!("Model answered after {} attempt(s)", attempts);
                Ok(text)
            }
            Err(LLMError::Timeout) => Err(GenerationError::Timeout(self.timeout)),
            Err(LLMError::NotConfigured(key)) => Err(GenerationError::NotConfigured(key)),
            Err(source) => Err(GenerationError::Provider { attempts, source }),
        }
    }
}
