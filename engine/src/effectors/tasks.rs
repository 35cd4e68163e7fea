//! Task and project effectors

use super::{Effector, EffectorError};
use crate::db::StateStore;
use async_trait::async_trait;
use sdk::types::Action;
use std::sync::Arc;
use tracing::info;

fn required_value<'a>(action: &'a Action, what: &str) -> Result<&'a str, EffectorError> {
    let value = action.value.trim();
    if value.is_empty() {
        return Err(EffectorError::InvalidInput(format!("{} is empty", what)));
    }
    Ok(value)
}

pub struct AddTask {
    store: Arc<dyn StateStore>,
}

impl AddTask {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Effector for AddTask {
    fn name(&self) -> &str {
        "add_task"
    }

    async fn apply(&self, action: &Action) -> Result<String, EffectorError> {
        let title = required_value(action, "task title")?;
        let task = self.store.add_task(title).await?;
        info!("Task {} added", task.id);
        Ok(format!("Task added: {}", task.title))
    }
}

/// Marks the first case-insensitive title match as done
pub struct CompleteTask {
    store: Arc<dyn StateStore>,
}

impl CompleteTask {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Effector for CompleteTask {
    fn name(&self) -> &str {
        "complete_task"
    }

    async fn apply(&self, action: &Action) -> Result<String, EffectorError> {
        match self.store.complete_task(&action.value).await? {
            Some(task) => Ok(format!("Task completed: {}", task.title)),
            None => Ok(format!("Task not found: {}", action.value)),
        }
    }
}

pub struct AddProject {
    store: Arc<dyn StateStore>,
}

impl AddProject {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Effector for AddProject {
    fn name(&self) -> &str {
        "add_project"
    }

    async fn apply(&self, action: &Action) -> Result<String, EffectorError> {
        let name = required_value(action, "project name")?;
        let project = self.store.add_project(name).await?;
        info!("Project {} added", project.id);
        Ok(format!("Project added: {}", project.name))
    }
}
