/// Database module for state persistence
///
/// This module owns everything the pipeline reads or writes: tasks, projects,
/// the append-only memory log, the life-metric context and the status
/// history. It uses sqlx with WAL mode for the persistent backend; an
/// in-memory backend with identical semantics serves tests and `storage.backend
/// = "memory"`.
use crate::config::{Config, StorageBackend};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sdk::types::{HistoryRecord, MemoryRecord, Project, Task};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub mod in_memory;
pub mod memory;
pub mod tasks;

// Re-export commonly used types
pub use in_memory::InMemoryStore;
pub use memory::{ContextRepository, MemoryLog};
pub use tasks::TaskRepository;

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Everything the pipeline needs from its state backend
///
/// Implementations serialize their own writes; callers may share one store
/// across the request path and the scheduler.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn add_task(&self, title: &str) -> Result<Task>;

    /// Mark the first task whose title matches case-insensitively as done.
    /// `None` when nothing matches.
    async fn complete_task(&self, title: &str) -> Result<Option<Task>>;

    async fn toggle_task(&self, id: i64) -> Result<Option<Task>>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn add_project(&self, name: &str) -> Result<Project>;

    /// Advance a project's status (Planning → Active → Completed → Planning)
    async fn toggle_project(&self, id: i64) -> Result<Option<Project>>;

    async fn append_memory(&self, command: &str, plan: &str, result: &str)
        -> Result<MemoryRecord>;

    /// The most recent `limit` memory records, oldest first
    async fn recent_memory(&self, limit: usize) -> Result<Vec<MemoryRecord>>;

    async fn memory_count(&self) -> Result<usize>;

    /// Merge metric values into the context snapshot, last write wins
    async fn merge_context(&self, entries: Vec<(String, String)>) -> Result<()>;

    async fn context_snapshot(&self) -> Result<BTreeMap<String, String>>;

    async fn log_history(&self, score: i64, insight: &str) -> Result<HistoryRecord>;

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Make pending writes durable before shutdown
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file
    ///
    /// This will:
    /// 1. Create the parent directory and the file if they don't exist
    /// 2. Enable WAL mode
    /// 3. Run migrations to set up the schema
    ///
    /// SQLite replays a leftover WAL by itself on open, so an unclean shutdown
    /// needs no extra recovery step here.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Migrations are idempotent and can be run multiple times safely.
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_initial.sql")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checkpoint the WAL into the main database file
    pub async fn flush_wal(&self) -> Result<()> {
        info!("Flushing WAL to disk");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        debug!("WAL flushed successfully");
        Ok(())
    }

    /// Flush the WAL and close all connections in the pool
    pub async fn close(self) -> Result<()> {
        info!("Closing database connection");

        self.flush_wal().await?;
        self.pool.close().await;

        info!("Database connection closed");
        Ok(())
    }

    pub fn tasks(&self) -> TaskRepository {
        TaskRepository::new(self.pool.clone())
    }

    pub fn memory(&self) -> MemoryLog {
        MemoryLog::new(self.pool.clone())
    }

    pub fn context(&self) -> ContextRepository {
        ContextRepository::new(self.pool.clone())
    }
}

/// [`StateStore`] backed by SQLite
pub struct SqliteStore {
    db: Database,
    tasks: TaskRepository,
    memory: MemoryLog,
    context: ContextRepository,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db = Database::new(db_path).await?;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            tasks: db.tasks(),
            memory: db.memory(),
            context: db.context(),
            db,
        }
    }

    pub async fn close(self) -> Result<()> {
        self.db.close().await
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.tasks.list_tasks().await
    }

    async fn add_task(&self, title: &str) -> Result<Task> {
        self.tasks.create_task(title).await
    }

    async fn complete_task(&self, title: &str) -> Result<Option<Task>> {
        self.tasks.complete_task_by_title(title).await
    }

    async fn toggle_task(&self, id: i64) -> Result<Option<Task>> {
        self.tasks.toggle_task(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.tasks.list_projects().await
    }

    async fn add_project(&self, name: &str) -> Result<Project> {
        self.tasks.create_project(name).await
    }

    async fn toggle_project(&self, id: i64) -> Result<Option<Project>> {
        self.tasks.toggle_project(id).await
    }

    async fn append_memory(
        &self,
        command: &str,
        plan: &str,
        result: &str,
    ) -> Result<MemoryRecord> {
        self.memory.append(command, plan, result).await
    }

    async fn recent_memory(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        self.memory.recent(limit as i64).await
    }

    async fn memory_count(&self) -> Result<usize> {
        Ok(self.memory.count().await? as usize)
    }

    async fn merge_context(&self, entries: Vec<(String, String)>) -> Result<()> {
        self.context.merge(&entries).await
    }

    async fn context_snapshot(&self) -> Result<BTreeMap<String, String>> {
        self.context.snapshot().await
    }

    async fn log_history(&self, score: i64, insight: &str) -> Result<HistoryRecord> {
        self.memory.log_history(score, insight).await
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.memory.recent_history(limit as i64).await
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_wal().await
    }
}

/// Open the backend selected in the config
pub async fn open_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory state store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(&config.database_path())
                .await
                .context("Failed to open database")?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::types::ProjectStatus;
    use tempfile::TempDir;

    async fn temp_store(temp_dir: &TempDir) -> SqliteStore {
        SqliteStore::open(&temp_dir.path().join("lifeos.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());

        let result = sqlx::query("SELECT 1").fetch_one(db.pool()).await;
        assert!(result.is_ok());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();

        for table in ["tasks", "projects", "memory_log", "life_context", "life_history"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();

        let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();

        assert_eq!(journal_mode.to_lowercase(), "wal");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_task_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir).await;

        store.add_task("Buy Milk").await.unwrap();
        let done = store.complete_task("buy milk").await.unwrap().unwrap();
        assert_eq!(done.title, "Buy Milk");
        assert!(done.done);

        assert!(store.complete_task("walk dog").await.unwrap().is_none());

        let tasks = store.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].done);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_project_wraps_around() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir).await;

        let project = store.add_project("Garden").await.unwrap();
        assert_eq!(project.status, ProjectStatus::Planning);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(store.toggle_project(project.id).await.unwrap().unwrap().status);
        }
        assert_eq!(
            seen,
            vec![ProjectStatus::Active, ProjectStatus::Completed, ProjectStatus::Planning]
        );

        assert!(store.toggle_project(999).await.unwrap().is_none());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let store = temp_store(&temp_dir).await;
        store.add_task("persist me").await.unwrap();
        store
            .append_memory("ADD TASK: persist me", "{}", "[]")
            .await
            .unwrap();
        store
            .merge_context(vec![("sleep_hours".to_string(), "7".to_string())])
            .await
            .unwrap();
        store.close().await.unwrap();

        let store = temp_store(&temp_dir).await;
        assert_eq!(store.list_tasks().await.unwrap()[0].title, "persist me");
        assert_eq!(store.memory_count().await.unwrap(), 1);
        assert_eq!(
            store.context_snapshot().await.unwrap().get("sleep_hours"),
            Some(&"7".to_string())
        );
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_recent_memory_is_oldest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir).await;

        for i in 0..5 {
            store
                .append_memory(&format!("command {}", i), "{}", "[]")
                .await
                .unwrap();
        }

        let recent = store.recent_memory(3).await.unwrap();
        let commands: Vec<&str> = recent.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(commands, vec!["command 2", "command 3", "command 4"]);

        store.close().await.unwrap();
    }
}
