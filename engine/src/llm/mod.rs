//! LLM Provider Abstraction Layer
//!
//! The plan generator talks to the model through the [`LLMProvider`] trait so
//! the provider can be swapped (or mocked in tests) without touching retry or
//! validation logic. Providers return the raw text of the model's answer;
//! turning it into a plan is the validator's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LLMError {
    /// Transient provider failures worth another attempt: 429, 500 and 503.
    /// Everything else, timeouts included, fails the call immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, LLMError::Http { status, .. } if matches!(status, 429 | 500 | 503))
    }
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Whether the provider has the credentials it needs. Checked on every
    /// request so a key that shows up later takes effect without a restart.
    fn is_configured(&self) -> bool;

    /// Send one request and return the raw text of the model's answer.
    ///
    /// The answer is requested in JSON mode; callers still must not assume it
    /// parses.
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}
