// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed task persistence.
//!
//! Every query is also exposed as a free function over `&PgPool` so callers
//! holding a bare pool (migration tooling, admin scripts) can use it directly.

use sqlx::PgPool;

use crate::error::CoreError;
use crate::task::Task;

use super::TaskPersistence;

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Task Operations
// ============================================================================

/// Get a task by ID.
pub async fn get_task(pool: &PgPool, task_id: &str) -> Result<Option<Task>, CoreError> {
    let record = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, created, updated, title, request, success, fail,
               repo_url, repo_commit, source_url, source_checksum,
               result_url, result_hash, message
        FROM tasks
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Insert a new task row.
pub async fn insert_task(pool: &PgPool, task: &Task) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO tasks (
            id, created, updated, title, request, success, fail,
            repo_url, repo_commit, source_url, source_checksum,
            result_url, result_hash, message
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
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
    .execute(pool)
    .await
    .map_err(|e| CoreError::DatabaseError {
        operation: "insert_task".to_string(),
        details: e.to_string(),
    })?;

    Ok(())
}

/// Overwrite all mutable columns of an existing task.
pub async fn update_task(pool: &PgPool, task: &Task) -> Result<u64, CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET updated = $2, title = $3, request = $4, success = $5, fail = $6,
            repo_url = $7, repo_commit = $8, source_url = $9, source_checksum = $10,
            result_url = $11, result_hash = $12, message = $13
        WHERE id = $1
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
    .execute(pool)
    .await
    .map_err(|e| CoreError::DatabaseError {
        operation: "update_task".to_string(),
        details: e.to_string(),
    })?;

    Ok(result.rows_affected())
}

/// Delete a task by ID.
pub async fn delete_task(pool: &PgPool, task_id: &str) -> Result<u64, CoreError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// List tasks, newest first.
pub async fn list_tasks(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Task>, CoreError> {
    let records = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, created, updated, title, request, success, fail,
               repo_url, repo_commit, source_url, source_checksum,
               result_url, result_hash, message
        FROM tasks
        ORDER BY created DESC, id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Health check - verify database connectivity.
pub async fn health_check_db(pool: &PgPool) -> Result<bool, CoreError> {
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
    Ok(row.0 == 1)
}

#[async_trait::async_trait]
impl TaskPersistence for PostgresPersistence {
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, CoreError> {
        get_task(&self.pool, task_id).await
    }

    async fn insert_task(&self, task: &Task) -> Result<(), CoreError> {
        insert_task(&self.pool, task).await
    }

    async fn update_task(&self, task: &Task) -> Result<u64, CoreError> {
        update_task(&self.pool, task).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<u64, CoreError> {
        delete_task(&self.pool, task_id).await
    }

    async fn list_tasks(&self, limit: i64, offset: i64) -> Result<Vec<Task>, CoreError> {
        list_tasks(&self.pool, limit, offset).await
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        health_check_db(&self.pool).await
    }
}
