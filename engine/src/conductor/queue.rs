//! Intent Queue
//!
//! FIFO of commands received while the plan generator was unconfigured.
//! Entries leave the queue only by being processed or dead-lettered.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedIntent {
    pub id: String,
    pub command: String,
    pub enqueued_at: i64,
    pub failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueuedIntent>,
    dead_letters: Vec<QueuedIntent>,
}

#[derive(Debug, Default)]
pub struct IntentQueue {
    state: Mutex<QueueState>,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command at the tail
    pub async fn enqueue(&self, command: &str) -> QueuedIntent {
        let entry = QueuedIntent {
            id: Uuid::new_v4().to_string(),
            command: command.to_string(),
            enqueued_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            failures: 0,
            last_error: None,
        };

        self.state.lock().await.pending.push_back(entry.clone());
        entry
    }

    pub async fn pop_front(&self) -> Option<QueuedIntent> {
        self.state.lock().await.pending.pop_front()
    }

    /// Put a failed entry back at the head so ordering is preserved
    pub async fn requeue_front(&self, entry: QueuedIntent) {
        self.state.lock().await.pending.push_front(entry);
    }

    pub async fn dead_letter(&self, entry: QueuedIntent) {
        self.state.lock().await.dead_letters.push(entry);
    }

    pub async fn pending(&self) -> Vec<QueuedIntent> {
        self.state.lock().await.pending.iter().cloned().collect()
    }

    pub async fn dead_letters(&self) -> Vec<QueuedIntent> {
        self.state.lock().await.dead_letters.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.pending.is_empty()
    }
}
