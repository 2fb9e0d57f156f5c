//! SQLite-backed persistence implementation.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;
use crate::migrations;
use crate::task::Task;

use super::TaskPersistence;

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// This convenience constructor handles all setup:
    /// - Creates parent directories if they don't exist
    /// - Creates the database file if it doesn't exist
    /// - Connects to the database with sensible defaults
    /// - Runs all migrations
    ///
    /// # Example
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/tasks.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    /// Connect to a `sqlite:` URL and run migrations.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;

        migrations::run_sqlite(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl TaskPersistence for SqlitePersistence {
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, CoreError> {
        let record = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, created, updated, title, request, success, fail,
                   repo_url, repo_commit, source_url, source_checksum,
                   result_url, result_hash, message
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_task(&self, task: &Task) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, created, updated, title, request, success, fail,
                repo_url, repo_commit, source_url, source_checksum,
                result_url, result_hash, message
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(task.created)
        .bind(task.updated)
        .bind(&task.title)
        .bind(task.request)
        .bind(task.success)
        .bind(task.fail)
        .bind(&task.repo_url)
        .bind(&task.repo_commit)
        .bind(&task.source_url)
        .bind(&task.source_checksum)
        .bind(&task.result_url)
        .bind(&task.result_hash)
        .bind(&task.message)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError {
            operation: "insert_task".to_string(),
            details: e.to_string(),
        })?;

        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET updated = ?2, title = ?3, request = ?4, success = ?5, fail = ?6,
                repo_url = ?7, repo_commit = ?8, source_url = ?9, source_checksum = ?10,
                result_url = ?11, result_hash = ?12, message = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&task.id)
        .bind(task.updated)
        .bind(&task.title)
        .bind(task.request)
        .bind(task.success)
        .bind(task.fail)
        .bind(&task.repo_url)
        .bind(&task.repo_commit)
        .bind(&task.source_url)
        .bind(&task.source_checksum)
        .bind(&task.result_url)
        .bind(&task.result_hash)
        .bind(&task.message)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError {
            operation: "update_task".to_string(),
            details: e.to_string(),
        })?;

        Ok(result.rows_affected())
    }

    async fn delete_task(&self, task_id: &str) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_tasks(&self, limit: i64, offset: i64) -> Result<Vec<Task>, CoreError> {
        let records = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, created, updated, title, request, success, fail,
                   repo_url, repo_commit, source_url, source_checksum,
                   result_url, result_hash, message
            FROM tasks
            ORDER BY created DESC, id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let result: Result<(i64,), _> = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await;
        Ok(result.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    /// Create an in-memory SQLite pool for testing.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        migrations::run_sqlite(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn make_task(title: &str) -> Task {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Task {
            id: Uuid::new_v4().to_string(),
            created,
            updated: created,
            repo_url: "https://github.com/archivers-space/mirror".to_string(),
            repo_commit: "9f8e7d".to_string(),
            source_url: "https://example.com/data.csv".to_string(),
            source_checksum: "sha256:abcd".to_string(),
            ..Task::new(title)
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_task() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let task = make_task("mirror wiki");

        persistence
            .insert_task(&task)
            .await
            .expect("Failed to insert task");

        let loaded = persistence
            .get_task(&task.id)
            .await
            .expect("Failed to get task")
            .expect("Task should exist");

        assert_eq!(loaded, task);
    }

    #[tokio::test]
    async fn test_get_task_not_found() {
        let persistence = SqlitePersistence::new(test_pool().await);

        let result = persistence
            .get_task("nonexistent")
            .await
            .expect("Query should succeed");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_is_database_error() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let task = make_task("dup");

        persistence.insert_task(&task).await.unwrap();
        let err = persistence.insert_task(&task).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::DatabaseError { ref operation, .. } if operation == "insert_task"
        ));
    }

    #[tokio::test]
    async fn test_update_task_keeps_created() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let mut task = make_task("mirror wiki");
        persistence.insert_task(&task).await.unwrap();

        let original_created = task.created;
        task.created = original_created + Duration::days(365);
        task.updated = original_created + Duration::seconds(10);
        task.request = Some(original_created + Duration::seconds(9));
        task.message = "queued".to_string();

        let rows = persistence.update_task(&task).await.unwrap();
        assert_eq!(rows, 1);

        let loaded = persistence.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.created, original_created);
        assert_eq!(loaded.updated, task.updated);
        assert_eq!(loaded.request, task.request);
        assert_eq!(loaded.message, "queued");
    }

    #[tokio::test]
    async fn test_update_unknown_task_affects_nothing() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let task = make_task("ghost");

        let rows = persistence.update_task(&task).await.unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_delete_task() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let task = make_task("to delete");
        persistence.insert_task(&task).await.unwrap();

        assert_eq!(persistence.delete_task(&task.id).await.unwrap(), 1);
        assert_eq!(persistence.delete_task(&task.id).await.unwrap(), 0);
        assert!(persistence.get_task(&task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_tasks_newest_first() {
        let persistence = SqlitePersistence::new(test_pool().await);

        for i in 0..3 {
            let mut task = make_task(&format!("task {}", i));
            task.created += Duration::minutes(i);
            task.updated = task.created;
            persistence.insert_task(&task).await.unwrap();
        }

        let all = persistence.list_tasks(10, 0).await.unwrap();
        let titles: Vec<_> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["task 2", "task 1", "task 0"]);

        let page = persistence.list_tasks(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "task 1");
    }

    #[tokio::test]
    async fn test_health_check_db() {
        let persistence = SqlitePersistence::new(test_pool().await);
        assert!(persistence.health_check_db().await.unwrap());
    }

    #[tokio::test]
    async fn test_from_path_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.db");

        let persistence = SqlitePersistence::from_path(&path).await.unwrap();

        assert!(path.exists());
        assert!(persistence.list_tasks(10, 0).await.unwrap().is_empty());
    }
}
