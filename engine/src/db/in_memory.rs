//! Process-local state store
//!
//! Same semantics as the SQLite backend; nothing survives a restart.

use anyhow::Result;
use async_trait::async_trait;
use sdk::types::{HistoryRecord, MemoryRecord, Project, ProjectStatus, Task};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{unix_now, StateStore};

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    memory: Vec<MemoryRecord>,
    history: Vec<HistoryRecord>,
    context: BTreeMap<String, String>,
    next_task_id: i64,
    next_project_id: i64,
}

impl Inner {
    fn next_task_id(&mut self) -> i64 {
        self.next_task_id += 1;
        self.next_task_id
    }

    fn next_project_id(&mut self) -> i64 {
        self.next_project_id += 1;
        self.next_project_id
    }
}

/// Single async mutex around all collections
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tail<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items[items.len().saturating_sub(limit)..].to_vec()
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.inner.lock().await.tasks.clone())
    }

    async fn add_task(&self, title: &str) -> Result<Task> {
        let mut inner = self.inner.lock().await;
        let task = Task {
            id: inner.next_task_id(),
            title: title.to_string(),
            done: false,
        };
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn complete_task(&self, title: &str) -> Result<Option<Task>> {
        let needle = title.trim().to_lowercase();
        let mut inner = self.inner.lock().await;

        Ok(inner
            .tasks
            .iter_mut()
            .find(|t| t.title.trim().to_lowercase() == needle)
            .map(|t| {
                t.done = true;
                t.clone()
            }))
    }

    async fn toggle_task(&self, id: i64) -> Result<Option<Task>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.tasks.iter_mut().find(|t| t.id == id).map(|t| {
            t.done = !t.done;
            t.clone()
        }))
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.inner.lock().await.projects.clone())
    }

    async fn add_project(&self, name: &str) -> Result<Project> {
        let mut inner = self.inner.lock().await;
        let project = Project {
            id: inner.next_project_id(),
            name: name.to_string(),
            status: ProjectStatus::Planning,
        };
        inner.projects.push(project.clone());
        Ok(project)
    }

    async fn toggle_project(&self, id: i64) -> Result<Option<Project>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.projects.iter_mut().find(|p| p.id == id).map(|p| {
            p.status = p.status.next();
            p.clone()
        }))
    }

    async fn append_memory(
        &self,
        command: &str,
        plan: &str,
        result: &str,
    ) -> Result<MemoryRecord> {
        let mut inner = self.inner.lock().await;
        let record = MemoryRecord {
            id: inner.memory.len() as i64 + 1,
            command: command.to_string(),
            plan: plan.to_string(),
            result: result.to_string(),
            created_at: unix_now(),
        };
        inner.memory.push(record.clone());
        Ok(record)
    }

    async fn recent_memory(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        Ok(tail(&self.inner.lock().await.memory, limit))
    }

    async fn memory_count(&self) -> Result<usize> {
        Ok(self.inner.lock().await.memory.len())
    }

    async fn merge_context(&self, entries: Vec<(String, String)>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.context.extend(entries);
        Ok(())
    }

    async fn context_snapshot(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.inner.lock().await.context.clone())
    }

    async fn log_history(&self, score: i64, insight: &str) -> Result<HistoryRecord> {
        let mut inner = self.inner.lock().await;
        let record = HistoryRecord {
            id: inner.history.len() as i64 + 1,
            score,
            insight: insight.to_string(),
            created_at: unix_now(),
        };
        inner.history.push(record.clone());
        Ok(record)
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(tail(&self.inner.lock().await.history, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = InMemoryStore::new();
        let a = store.add_task("a").await.unwrap();
        let b = store.add_task("b").await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let p = store.add_project("p").await.unwrap();
        assert_eq!(p.id, 1);
    }

    #[tokio::test]
    async fn test_complete_first_match_only() {
        let store = InMemoryStore::new();
        store.add_task("Call Mom").await.unwrap();
        store.add_task("call mom").await.unwrap();

        let done = store.complete_task("CALL MOM").await.unwrap().unwrap();
        assert_eq!(done.id, 1);

        let tasks = store.list_tasks().await.unwrap();
        assert!(tasks[0].done);
        assert!(!tasks[1].done);
    }

    #[tokio::test]
    async fn test_toggle_task_flips() {
        let store = InMemoryStore::new();
        let task = store.add_task("stretch").await.unwrap();

        assert!(store.toggle_task(task.id).await.unwrap().unwrap().done);
        assert!(!store.toggle_task(task.id).await.unwrap().unwrap().done);
        assert!(store.toggle_task(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_last_write_wins() {
        let store = InMemoryStore::new();
        store
            .merge_context(vec![
                ("steps".to_string(), "1000".to_string()),
                ("mood".to_string(), "ok".to_string()),
            ])
            .await
            .unwrap();
        store
            .merge_context(vec![("steps".to_string(), "5000".to_string())])
            .await
            .unwrap();

        let snapshot = store.context_snapshot().await.unwrap();
        assert_eq!(snapshot["steps"], "5000");
        assert_eq!(snapshot["mood"], "ok");
    }

    #[tokio::test]
    async fn test_recent_memory_window() {
        let store = InMemoryStore::new();
        for i in 0..4 {
            store
                .append_memory(&format!("c{}", i), "{}", "[]")
                .await
                .unwrap();
        }

        let recent = store.recent_memory(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].command, "c2");
        assert_eq!(recent[1].command, "c3");
        assert_eq!(store.recent_memory(10).await.unwrap().len(), 4);
    }
}
