//! Memory Log and status history repository
//!
//! Both tables are append-only: this module exposes no update or delete.

use anyhow::{Context, Result};
use sdk::types::{HistoryRecord, MemoryRecord};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use super::unix_now;

/// Append-only record of processed commands and status evaluations
pub struct MemoryLog {
    pool: SqlitePool,
}

impl MemoryLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, command: &str, plan: &str, result: &str) -> Result<MemoryRecord> {
        let now = unix_now();

        let inserted = sqlx::query(
            "INSERT INTO memory_log (command, plan, result, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(command)
        .bind(plan)
        .bind(result)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to append memory record")?;

        Ok(MemoryRecord {
            id: inserted.last_insert_rowid(),
            command: command.to_string(),
            plan: plan.to_string(),
            result: result.to_string(),
            created_at: now,
        })
    }

    /// The last `limit` records, oldest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<MemoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, command, plan, result, created_at FROM memory_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch memory records")?;

        let mut records: Vec<MemoryRecord> = rows
            .into_iter()
            .map(|r| MemoryRecord {
                id: r.get("id"),
                command: r.get("command"),
                plan: r.get("plan"),
                result: r.get("result"),
                created_at: r.get("created_at"),
            })
            .collect();
        records.reverse();

        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM memory_log")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count memory records")
    }

    pub async fn log_history(&self, score: i64, insight: &str) -> Result<HistoryRecord> {
        let now = unix_now();

        let inserted =
            sqlx::query("INSERT INTO life_history (score, insight, created_at) VALUES (?, ?, ?)")
                .bind(score)
                .bind(insight)
                .bind(now)
                .execute(&self.pool)
                .await
                .context("Failed to log history")?;

        Ok(HistoryRecord {
            id: inserted.last_insert_rowid(),
            score,
            insight: insight.to_string(),
            created_at: now,
        })
    }

    /// The last `limit` history records, oldest first
    pub async fn recent_history(&self, limit: i64) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, score, insight, created_at FROM life_history ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch history")?;

        let mut records: Vec<HistoryRecord> = rows
            .into_iter()
            .map(|r| HistoryRecord {
                id: r.get("id"),
                score: r.get("score"),
                insight: r.get("insight"),
                created_at: r.get("created_at"),
            })
            .collect();
        records.reverse();

        Ok(records)
    }
}

/// Latest known values of the ingested life metrics
pub struct ContextRepository {
    pool: SqlitePool,
}

impl ContextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert every entry; last write wins per key
    pub async fn merge(&self, entries: &[(String, String)]) -> Result<()> {
        let now = unix_now();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO life_context (key, value, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to update context key {}", key))?;
        }

        tx.commit().await.context("Failed to commit context update")?;
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM life_context")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch context")?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("key"), r.get("value")))
            .collect())
    }
}
