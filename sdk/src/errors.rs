//! Error types and handling
//!
//! This module provides the error types shared by the LifeOS engine and its
//! HTTP surface. All errors implement the `LifeOsErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry credential values. Provider keys are wrapped in a
//! redacting type before they reach any code path that formats errors.

use thiserror::Error;

/// Trait for LifeOS error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait LifeOsErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried later (transient provider failures,
    /// a generator that is not configured yet). Non-recoverable errors need
    /// a different input or operator intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid config file or missing credential
/// - **Provider**: model provider failures (transient or permanent)
/// - **Validation**: model output that is not a valid plan
/// - **Request**: input the engine refuses outright
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, LifeOsErrorExt};
///
/// let error = EngineError::NotConfigured("OPENAI_API_KEY".to_string());
/// assert!(error.is_recoverable());
///
/// let malformed = EngineError::MalformedResponse {
///     raw: "sure, here's your plan".to_string(),
/// };
/// assert!(!malformed.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    NotConfigured(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Validation errors
    #[error("AI did not return valid JSON")]
    MalformedResponse { raw: String },

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LifeOsErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::NotConfigured(_) => "Set the missing credential in the environment",

            Self::LLMProvider(_) => "Model provider unavailable. Check your API key and network",
            Self::LLMTimeout => "Model provider took too long to respond. Try again",

            Self::MalformedResponse { .. } => "The model answered with something other than a plan",

            Self::InvalidRequest(_) => "Check the command you sent",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::MalformedResponse { .. }
            | Self::InvalidRequest(_) => false,

            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_response_message_is_stable() {
        let err = EngineError::MalformedResponse {
            raw: "not json".to_string(),
        };
        assert_eq!(err.to_string(), "AI did not return valid JSON");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_transient_errors_are_recoverable() {
        assert!(EngineError::LLMTimeout.is_recoverable());
        assert!(EngineError::LLMProvider("HTTP 429".to_string()).is_recoverable());
        assert!(EngineError::NotConfigured("OPENAI_API_KEY".to_string()).is_recoverable());
    }
}
