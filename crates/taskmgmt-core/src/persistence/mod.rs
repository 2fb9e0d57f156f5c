//! Persistence interfaces and backends for taskmgmt-core.
//!
//! [`TaskPersistence`] is the raw keyed-record gateway over the `tasks` table.
//! It knows nothing about identifiers being assigned or timestamps being
//! stamped; that is [`crate::store::TaskStore`]'s job.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::task::Task;

/// Persistence interface used by the task store.
#[async_trait]
pub trait TaskPersistence: Send + Sync {
    /// Fetch one task by identifier.
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, CoreError>;

    /// Insert a new row. The task's `id`, `created` and `updated` are written as given.
    async fn insert_task(&self, task: &Task) -> Result<(), CoreError>;

    /// Overwrite every mutable column of the row keyed by `task.id`.
    ///
    /// `created` is left untouched. Returns the number of rows affected.
    async fn update_task(&self, task: &Task) -> Result<u64, CoreError>;

    /// Delete the row keyed by `task_id`. Returns the number of rows affected.
    async fn delete_task(&self, task_id: &str) -> Result<u64, CoreError>;

    /// Page through tasks, newest `created` first.
    async fn list_tasks(&self, limit: i64, offset: i64) -> Result<Vec<Task>, CoreError>;

    /// Check if the database is reachable.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}
