//! Domain types shared by the engine and its HTTP surface
//!
//! Plans and actions come out of the model; tasks, projects and memory
//! records live in the state store.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Type tag of an action inside a plan.
///
/// Tags the engine does not know are preserved verbatim in `Unknown` so they
/// can be logged and reported, but they always dispatch to a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionType {
    AddTask,
    CompleteTask,
    AddProject,
    NoAction,
    CalendarShield,
    FinanceSweep,
    CognitiveReset,
    Unknown(String),
}

impl ActionType {
    /// Every recognized action type, in declaration order
    pub const KNOWN: [ActionType; 7] = [
        ActionType::AddTask,
        ActionType::CompleteTask,
        ActionType::AddProject,
        ActionType::NoAction,
        ActionType::CalendarShield,
        ActionType::FinanceSweep,
        ActionType::CognitiveReset,
    ];

    /// Parse a type tag. Matching ignores case and surrounding whitespace.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "ADD_TASK" => ActionType::AddTask,
            "COMPLETE_TASK" => ActionType::CompleteTask,
            "ADD_PROJECT" => ActionType::AddProject,
            "NO_ACTION" => ActionType::NoAction,
            "CALENDAR_SHIELD" => ActionType::CalendarShield,
            "FINANCE_SWEEP" => ActionType::FinanceSweep,
            "COGNITIVE_RESET" => ActionType::CognitiveReset,
            _ => ActionType::Unknown(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::AddTask => "ADD_TASK",
            ActionType::CompleteTask => "COMPLETE_TASK",
            ActionType::AddProject => "ADD_PROJECT",
            ActionType::NoAction => "NO_ACTION",
            ActionType::CalendarShield => "CALENDAR_SHIELD",
            ActionType::FinanceSweep => "FINANCE_SWEEP",
            ActionType::CognitiveReset => "COGNITIVE_RESET",
            ActionType::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ActionType::Unknown(_))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ActionType::parse(&tag))
    }
}

/// One typed instruction within a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Free-text value or target (task title, event id, amount, ...)
    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl Action {
    pub fn new(action_type: ActionType, value: impl Into<String>) -> Self {
        Self {
            action_type,
            value: value.into(),
            description: None,
            priority: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }
}

/// Structured output of the model: an intent label plus ordered actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub intent: String,
    pub actions: Vec<Action>,
}

/// A to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub done: bool,
}

/// Project lifecycle status. Advancing is cyclic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    Planning,
    Active,
    Completed,
}

impl ProjectStatus {
    /// The status one toggle later (Completed wraps to Planning)
    pub fn next(self) -> Self {
        match self {
            ProjectStatus::Planning => ProjectStatus::Active,
            ProjectStatus::Active => ProjectStatus::Completed,
            ProjectStatus::Completed => ProjectStatus::Planning,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProjectStatus::Planning => "Planning",
            ProjectStatus::Active => "Active",
            ProjectStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Planning" => Some(ProjectStatus::Planning),
            "Active" => Some(ProjectStatus::Active),
            "Completed" => Some(ProjectStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub status: ProjectStatus,
}

/// One processed command in the memory log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub command: String,
    /// Serialized plan JSON
    pub plan: String,
    /// Serialized per-action result list
    pub result: String,
    pub created_at: i64,
}

/// One scored status evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub score: i64,
    pub insight: String,
    pub created_at: i64,
}

/// Flat action shape used by the status report and by direct execution
/// requests (`action_type` / `target` rather than `type` / `value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_type: String,

    #[serde(default)]
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl ActionRequest {
    pub fn into_action(self) -> Action {
        Action {
            action_type: ActionType::parse(&self.action_type),
            value: self.target,
            description: self.description,
            priority: self.priority,
        }
    }
}

impl From<&Action> for ActionRequest {
    fn from(action: &Action) -> Self {
        Self {
            action_type: action.action_type.as_str().to_string(),
            target: action.value.clone(),
            description: action.description.clone(),
            priority: action.priority.clone(),
        }
    }
}

/// Scored life status produced from the context snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub score: i64,
    pub health_index: i64,
    pub wealth_index: i64,
    pub focus_index: i64,
    pub insight: String,
    pub pending_actions: Vec<ActionRequest>,
}

impl StatusReport {
    /// Score reported when the model could not be consulted
    pub const NEUTRAL_SCORE: i64 = 50;

    pub fn degraded(insight: impl Into<String>) -> Self {
        Self {
            score: Self::NEUTRAL_SCORE,
            health_index: Self::NEUTRAL_SCORE,
            wealth_index: Self::NEUTRAL_SCORE,
            focus_index: Self::NEUTRAL_SCORE,
            insight: insight.into(),
            pending_actions: Vec::new(),
        }
    }
}
