/// Task and project persistence operations
///
/// All queries use parameterized queries for SQL injection prevention.
/// Ids come from `AUTOINCREMENT`, so they are never reused even if rows are
/// removed by hand.
use anyhow::{Context, Result};
use sdk::types::{Project, ProjectStatus, Task};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::unix_now;

/// Task and project repository for database operations
pub struct TaskRepository {
    pool: SqlitePool,
}

fn task_from_row(r: &SqliteRow) -> Task {
    Task {
        id: r.get("id"),
        title: r.get("title"),
        done: r.get::<i64, _>("done") != 0,
    }
}

fn project_from_row(r: &SqliteRow) -> Result<Project> {
    let status: String = r.get("status");
    let status = ProjectStatus::parse(&status)
        .with_context(|| format!("Unknown project status in database: {}", status))?;

    Ok(Project {
        id: r.get("id"),
        name: r.get("name"),
        status,
    })
}

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new open task
    pub async fn create_task(&self, title: &str) -> Result<Task> {
        let now = unix_now();

        let result = sqlx::query("INSERT INTO tasks (title, done, created_at) VALUES (?, 0, ?)")
            .bind(title)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to create task")?;

        Ok(Task {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            done: false,
        })
    }

    /// All tasks in creation order
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT id, title, done FROM tasks ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch tasks")?;

        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Mark the first task whose title matches case-insensitively as done
    ///
    /// Matching happens in Rust so it agrees with the in-memory store on
    /// non-ASCII titles.
    pub async fn complete_task_by_title(&self, title: &str) -> Result<Option<Task>> {
        let needle = title.trim().to_lowercase();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let rows = sqlx::query("SELECT id, title, done FROM tasks ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to fetch tasks")?;

        let Some(mut task) = rows
            .iter()
            .map(task_from_row)
            .find(|t| t.title.trim().to_lowercase() == needle)
        else {
            return Ok(None);
        };

        sqlx::query("UPDATE tasks SET done = 1 WHERE id = ?")
            .bind(task.id)
            .execute(&mut *tx)
            .await
            .context("Failed to complete task")?;

        tx.commit().await.context("Failed to commit task completion")?;

        task.done = true;
        Ok(Some(task))
    }

    /// Flip a task's done flag
    pub async fn toggle_task(&self, task_id: i64) -> Result<Option<Task>> {
        let row = sqlx::query(
            "UPDATE tasks SET done = CASE done WHEN 0 THEN 1 ELSE 0 END WHERE id = ? RETURNING id, title, done",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to toggle task")?;

        Ok(row.as_ref().map(task_from_row))
    }

    /// Create a new project in the Planning state
    pub async fn create_project(&self, name: &str) -> Result<Project> {
        let now = unix_now();
        let status = ProjectStatus::Planning;

        let result = sqlx::query("INSERT INTO projects (name, status, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to create project")?;

        Ok(Project {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            status,
        })
    }

    /// All projects in creation order
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT id, name, status FROM projects ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch projects")?;

        rows.iter().map(project_from_row).collect()
    }

    /// Advance a project's status one step around the cycle
    pub async fn toggle_project(&self, project_id: i64) -> Result<Option<Project>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query("SELECT id, name, status FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch project")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut project = project_from_row(&row)?;
        project.status = project.status.next();

        sqlx::query("UPDATE projects SET status = ? WHERE id = ?")
            .bind(project.status.as_str())
            .bind(project.id)
            .execute(&mut *tx)
            .await
            .context("Failed to update project status")?;

        tx.commit().await.context("Failed to commit project toggle")?;

        Ok(Some(project))
    }
}
