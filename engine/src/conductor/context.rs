//! Prompt assembly
//!
//! Builds the message lists sent to the model for the two kinds of request:
//! a user command (with recent memory) and a status evaluation of the context
//! snapshot.

use crate::llm::Message;
use crate::secrets::{self, SecretSource};
use sdk::types::MemoryRecord;
use std::collections::BTreeMap;

/// Default instruction for turning a command into a plan
pub const COMMAND_INSTRUCTION: &str = "You are LifeOS, a personal operating system that turns the user's \
commands into concrete actions.\n\
Respond with a single JSON object and nothing else, in this shape:\n\
{\"intent\": \"short_label\", \"actions\": [{\"type\": \"ACTION_TYPE\", \"value\": \"text\"}]}\n\n\
Allowed action types:\n\
- ADD_TASK: value is the task title\n\
- COMPLETE_TASK: value is the title of an existing task\n\
- ADD_PROJECT: value is the project name\n\
- CALENDAR_SHIELD: value is the id of a calendar event to push back one day\n\
- FINANCE_SWEEP: value is the amount to move to savings\n\
- COGNITIVE_RESET: value may be empty\n\
- NO_ACTION: when nothing should change\n\n\
Use an empty actions list if the command asks for nothing actionable.";

/// Instruction for scoring the context snapshot
pub const STATUS_INSTRUCTION: &str = "You are LifeOS, evaluating the user's current state from their \
latest life metrics.\n\
Respond with a single JSON object and nothing else, in this shape:\n\
{\"score\": 0-100, \"health_index\": 0-100, \"wealth_index\": 0-100, \"focus_index\": 0-100, \
\"insight\": \"one or two sentences\", \"pending_actions\": [{\"action_type\": \"ACTION_TYPE\", \
\"target\": \"text\", \"description\": \"why\", \"priority\": \"low|medium|high\"}]}\n\n\
Suggest pending actions only from: CALENDAR_SHIELD, FINANCE_SWEEP, COGNITIVE_RESET, ADD_TASK.";

/// System instructions in effect for this process
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub command_instruction: String,
    pub status_instruction: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            command_instruction: COMMAND_INSTRUCTION.to_string(),
            status_instruction: STATUS_INSTRUCTION.to_string(),
        }
    }
}

impl PromptSet {
    /// The command instruction can be replaced by the operator:
    /// `LIFEOS_SYSTEM_INSTRUCTION` wins over `llm.system_instruction`, which
    /// wins over the built-in text.
    pub fn resolve(configured: Option<&str>, secrets: &dyn SecretSource) -> Self {
        let command_instruction = secrets
            .get_secret(secrets::SYSTEM_INSTRUCTION)
            .map(|s| s.expose().to_string())
            .or_else(|| {
                configured
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| COMMAND_INSTRUCTION.to_string());

        Self {
            command_instruction,
            ..Self::default()
        }
    }

    pub fn command_messages(&self, memory: &[MemoryRecord], command: &str) -> Vec<Message> {
        vec![
            Message::system(&self.command_instruction),
            Message::user(render_command(memory, command)),
        ]
    }

    pub fn status_messages(&self, snapshot: &BTreeMap<String, String>) -> Vec<Message> {
        vec![
            Message::system(&self.status_instruction),
            Message::user(render_snapshot(snapshot)),
        ]
    }
}

/// Recent exchanges followed by the new command
pub fn render_command(memory: &[MemoryRecord], command: &str) -> String {
    let mut prompt = String::new();
    for record in memory {
        prompt.push_str(&format!(
            "Command: {}\nResponse: {}\n",
            record.command, record.plan
        ));
    }
    prompt.push_str(&format!("User command: {}", command));
    prompt
}

pub fn render_snapshot(snapshot: &BTreeMap<String, String>) -> String {
    if snapshot.is_empty() {
        return "No metrics have been ingested yet.".to_string();
    }

    let mut prompt = String::from("Current life metrics:\n");
    for (key, value) in snapshot {
        prompt.push_str(&format!("- {}: {}\n", key, value));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecrets;

    fn record(command: &str, plan: &str) -> MemoryRecord {
        MemoryRecord {
            id: 1,
            command: command.to_string(),
            plan: plan.to_string(),
            result: "[]".to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn test_render_command_with_memory() {
        let memory = vec![record("add task: a", r#"{"intent":"add_task"}"#)];
        let prompt = render_command(&memory, "add task: b");
        assert_eq!(
            prompt,
            "Command: add task: a\nResponse: {\"intent\":\"add_task\"}\nUser command: add task: b"
        );
    }

    #[test]
    fn test_render_empty_snapshot() {
        assert!(render_snapshot(&BTreeMap::new()).contains("No metrics"));
    }

    #[test]
    fn test_render_snapshot_sorted() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("sleep".to_string(), "6".to_string());
        snapshot.insert("hrv".to_string(), "42".to_string());
        let prompt = render_snapshot(&snapshot);
        assert!(prompt.find("hrv").unwrap() < prompt.find("sleep").unwrap());
    }

    #[test]
    fn test_instruction_override_order() {
        let empty = MemorySecrets::new();
        assert_eq!(
            PromptSet::resolve(None, &empty).command_instruction,
            COMMAND_INSTRUCTION
        );
        assert_eq!(
            PromptSet::resolve(Some("from config"), &empty).command_instruction,
            "from config"
        );

        let env = MemorySecrets::new().with(secrets::SYSTEM_INSTRUCTION, "from env");
        let prompts = PromptSet::resolve(Some("from config"), &env);
        assert_eq!(prompts.command_instruction, "from env");
        assert_eq!(prompts.status_instruction, STATUS_INSTRUCTION);
    }
}
