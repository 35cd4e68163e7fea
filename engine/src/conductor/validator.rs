//! Plan Validator
//!
//! Turns raw model text into typed values. Nothing here talks to the network
//! or the store; a rejected answer is reported with the raw text attached.

use sdk::types::{Action, ActionRequest, ActionType, Plan, StatusReport};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("AI did not return valid JSON")]
    Malformed { raw: String, reason: String },
}

impl PlanError {
    fn malformed(raw: &str, reason: impl Into<String>) -> Self {
        PlanError::Malformed {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            PlanError::Malformed { raw, .. } => raw,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            PlanError::Malformed { reason, .. } => reason,
        }
    }
}

/// Drop a surrounding Markdown code fence, if any
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, PlanError> {
    match serde_json::from_str::<Value>(strip_fence(raw)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PlanError::malformed(raw, "top-level value is not an object")),
        Err(e) => Err(PlanError::malformed(raw, e.to_string())),
    }
}

fn string_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match obj.get(*name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn parse_action(raw: &str, index: usize, value: &Value) -> Result<Action, PlanError> {
    let obj = value
        .as_object()
        .ok_or_else(|| PlanError::malformed(raw, format!("action {} is not an object", index)))?;

    let tag = match obj.get("type").or_else(|| obj.get("action_type")) {
        Some(Value::String(tag)) if !tag.trim().is_empty() => tag,
        _ => {
            return Err(PlanError::malformed(
                raw,
                format!("action {} has no type", index),
            ))
        }
    };

    Ok(Action {
        action_type: ActionType::parse(tag),
        value: string_field(obj, &["value", "target"]).unwrap_or_default(),
        description: string_field(obj, &["description"]),
        priority: string_field(obj, &["priority"]),
    })
}

fn parse_actions(raw: &str, obj: &Map<String, Value>, key: &str) -> Result<Vec<Action>, PlanError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_action(raw, i, item))
            .collect(),
        Some(_) => Err(PlanError::malformed(raw, format!("{} is not an array", key))),
    }
}

/// Validate a command plan: `{"intent": ..., "actions": [...]}`
pub fn validate_plan(raw: &str) -> Result<Plan, PlanError> {
    let obj = parse_object(raw)?;

    let intent = string_field(&obj, &["intent"])
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Plan {
        intent,
        actions: parse_actions(raw, &obj, "actions")?,
    })
}

fn index_field(obj: &Map<String, Value>, name: &str) -> i64 {
    obj.get(name)
        .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
        .map(|n| n.round().clamp(0.0, 100.0) as i64)
        .unwrap_or(StatusReport::NEUTRAL_SCORE)
}

/// Validate a status evaluation. Missing scores fall back to neutral, scores
/// are clamped to 0..=100.
pub fn validate_status(raw: &str) -> Result<StatusReport, PlanError> {
    let obj = parse_object(raw)?;

    let pending_actions = parse_actions(raw, &obj, "pending_actions")?
        .iter()
        .map(ActionRequest::from)
        .collect();

    Ok(StatusReport {
        score: index_field(&obj, "score"),
        health_index: index_field(&obj, "health_index"),
        wealth_index: index_field(&obj, "wealth_index"),
        focus_index: index_field(&obj, "focus_index"),
        insight: string_field(&obj, &["insight"]).unwrap_or_default(),
        pending_actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_plan() {
        let plan = validate_plan(
            r#"{"intent":"add_task","actions":[{"type":"ADD_TASK","value":"buy milk"}]}"#,
        )
        .unwrap();
        assert_eq!(plan.intent, "add_task");
        assert_eq!(plan.actions, vec![Action::new(ActionType::AddTask, "buy milk")]);
    }

    #[test]
    fn test_not_json_keeps_raw() {
        let err = validate_plan("sure, here's your plan").unwrap_err();
        assert_eq!(err.to_string(), "AI did not return valid JSON");
        assert_eq!(err.raw(), "sure, here's your plan");
    }

    #[test]
    fn test_fenced_json_accepted() {
        let plan = validate_plan("```json\n{\"intent\":\"x\",\"actions\":[]}\n```").unwrap();
        assert_eq!(plan.intent, "x");
    }

    #[test]
    fn test_aliases_and_defaults() {
        let plan = validate_plan(
            r#"{"actions":[{"action_type":"complete_task","target":"Call mom","priority":"high"}]}"#,
        )
        .unwrap();
        assert_eq!(plan.intent, "unknown");
        assert_eq!(plan.actions[0].action_type, ActionType::CompleteTask);
        assert_eq!(plan.actions[0].value, "Call mom");
        assert_eq!(plan.actions[0].priority.as_deref(), Some("high"));
    }

    #[test]
    fn test_missing_actions_is_empty_plan() {
        let plan = validate_plan(r#"{"intent":"chat"}"#).unwrap();
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn test_bad_shapes_rejected() {
        for raw in [
            r#"["ADD_TASK"]"#,
            r#"{"actions":"ADD_TASK"}"#,
            r#"{"actions":["ADD_TASK"]}"#,
            r#"{"actions":[{"value":"no type"}]}"#,
        ] {
            let err = validate_plan(raw).unwrap_err();
            assert_eq!(err.raw(), raw);
        }
    }

    #[test]
    fn test_unknown_type_preserved() {
        let plan = validate_plan(r#"{"actions":[{"type":"TELEPORT","value":"mars"}]}"#).unwrap();
        assert_eq!(
            plan.actions[0].action_type,
            ActionType::Unknown("TELEPORT".to_string())
        );
    }

    #[test]
    fn test_status_report() {
        let report = validate_status(
            r#"{"score":72,"health_index":"80","wealth_index":140,"insight":"Sleep more",
                "pending_actions":[{"action_type":"COGNITIVE_RESET","description":"break"}]}"#,
        )
        .unwrap();
        assert_eq!(report.score, 72);
        assert_eq!(report.health_index, 80);
        assert_eq!(report.wealth_index, 100);
        assert_eq!(report.focus_index, 50);
        assert_eq!(report.pending_actions[0].action_type, "COGNITIVE_RESET");
        assert_eq!(report.pending_actions[0].description.as_deref(), Some("break"));
    }
}
