//! LifeOS Engine Library
//!
//! Intent-to-action pipeline: free-text commands become validated plans
//! which are dispatched to effectors and recorded in memory.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret lookup
pub mod secrets;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Side-effecting action handlers
pub mod effectors;

/// Conductor orchestration module
pub mod conductor;

/// HTTP API
pub mod api;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
