//! LifeOS SDK
//!
//! Shared library providing the domain types and error taxonomy used by the
//! LifeOS engine, its HTTP surface and its tests.

/// Error types and handling
pub mod errors;

/// Plan, action and state types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, LifeOsErrorExt};
pub use types::{
    Action, ActionRequest, ActionType, HistoryRecord, MemoryRecord, Plan, Project, ProjectStatus,
    StatusReport, Task,
};
