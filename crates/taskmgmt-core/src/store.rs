// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity lookup and upsert persistence for tasks.
//!
//! [`TaskStore::save`] decides between insert and update by probing for an
//! existing row:
//!
//! 1. Look the task up by `id` (an empty `id` is never found).
//! 2. Not found: assign a fresh UUID, stamp `created = updated = now`, insert.
//! 3. Found: stamp `updated = now`, overwrite every mutable column.
//! 4. Any other lookup error is returned without writing anything.
//!
//! The lookup and the write are separate statements. Two concurrent saves of
//! the same unsaved task both take the insert branch and produce two rows
//! with different identifiers; callers needing exactly-once creation must
//! serialize saves themselves.

use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::persistence::TaskPersistence;
use crate::task::Task;

/// Persistence gateway for [`Task`] records.
#[derive(Clone)]
pub struct TaskStore {
    persistence: Arc<dyn TaskPersistence>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("persistence", &"...")
            .field("clock", &"...")
            .finish()
    }
}

impl TaskStore {
    /// Create a store stamping times from the system clock.
    pub fn new(persistence: Arc<dyn TaskPersistence>) -> Self {
        Self::with_clock(persistence, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source.
    pub fn with_clock(persistence: Arc<dyn TaskPersistence>, clock: Arc<dyn Clock>) -> Self {
        Self { persistence, clock }
    }

    /// The time source used for stamping.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Look a task up by identifier.
    ///
    /// Fails with [`CoreError::TaskNotFound`] if `id` is empty or unknown.
    pub async fn find_by_id(&self, id: &str) -> Result<Task> {
        if id.is_empty() {
            return Err(CoreError::not_found(id));
        }

        self.persistence
            .get_task(id)
            .await?
            .ok_or_else(|| CoreError::not_found(id))
    }

    /// Insert or update `task` depending on whether its identifier is known.
    ///
    /// On success `task` carries the assigned `id` and the stamped
    /// `created`/`updated`. On failure `task` is left as it was.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn save(&self, task: &mut Task) -> Result<()> {
        match self.find_by_id(&task.id).await {
            Err(e) if e.is_not_found() => self.insert(task).await,
            Err(e) => Err(e),
            Ok(_) => self.update(task).await,
        }
    }

    async fn insert(&self, task: &mut Task) -> Result<()> {
        let now = self.clock.now_secs();
        let mut record = task.clone();
        record.id = Uuid::new_v4().to_string();
        record.created = now;
        record.updated = now;

        debug!(new_id = %record.id, "Inserting new task");
        self.persistence.insert_task(&record).await?;

        *task = record;
        Ok(())
    }

    async fn update(&self, task: &mut Task) -> Result<()> {
        let mut record = task.clone();
        record.updated = self.clock.now_secs();

        debug!("Updating existing task");
        let rows = self.persistence.update_task(&record).await?;
        if rows == 0 {
            // Row vanished between the lookup and the write.
            return Err(CoreError::not_found(&record.id));
        }

        task.updated = record.updated;
        Ok(())
    }

    /// Delete a task by identifier.
    ///
    /// Deleting an empty or unknown identifier fails with
    /// [`CoreError::TaskNotFound`].
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(CoreError::not_found(id));
        }

        match self.persistence.delete_task(id).await? {
            0 => Err(CoreError::not_found(id)),
            _ => Ok(()),
        }
    }

    /// Page through tasks, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Task>> {
        self.persistence.list_tasks(limit, offset).await
    }

    /// Check if the backing store is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        self.persistence.health_check_db().await
    }
}
