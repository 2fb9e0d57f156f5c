// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task lifecycle transitions.
//!
//! | Operation | Allowed from | Effect | Notifies |
//! |-----------|--------------|--------|----------|
//! | `run` | ready, failed | `request = now`, clears `success`/`fail` | task requested |
//! | `cancel` | running | `fail = now`, clears `success`, message `Task Cancelled` | task cancelled |
//! | `errored` | any | `fail = now`, clears `success`, message as given | - |
//! | `succeeded` | running | `success = now`, clears `fail`, sets result url/hash | - |
//!
//! Each transition is all-or-nothing for the caller's `Task`: if the
//! notification or the save fails, the task is put back exactly as it was
//! and nothing is persisted by this call.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{CoreError, Result};
use crate::notify::{NotificationKind, TaskNotifier};
use crate::store::TaskStore;
use crate::task::{Task, TaskStatus};

/// Message recorded on cancelled tasks.
pub const CANCELLED_MESSAGE: &str = "Task Cancelled";

/// Drives tasks through their lifecycle.
#[derive(Clone)]
pub struct TaskManager {
    store: TaskStore,
    notifier: Arc<dyn TaskNotifier>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("store", &self.store)
            .field("notifier", &"...")
            .finish()
    }
}

impl TaskManager {
    /// Create a manager over `store`, notifying through `notifier`.
    pub fn new(store: TaskStore, notifier: Arc<dyn TaskNotifier>) -> Self {
        Self { store, notifier }
    }

    /// The underlying store.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Request a run of a ready or failed task.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn run(&self, task: &mut Task) -> Result<()> {
        if !matches!(task.status(), TaskStatus::Ready | TaskStatus::Failed { .. }) {
            return Err(invalid(task, "run"));
        }

        let snapshot = task.clone();
        task.request = Some(self.store.clock().now_secs());
        task.fail = None;
        task.success = None;

        if let Err(e) = self.notify(NotificationKind::Requested, task).await {
            *task = snapshot;
            return Err(e);
        }
        self.commit(task, snapshot, "run").await
    }

    /// Cancel a running task.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn cancel(&self, task: &mut Task) -> Result<()> {
        if !matches!(task.status(), TaskStatus::Running { .. }) {
            return Err(invalid(task, "cancel"));
        }

        let snapshot = task.clone();
        task.fail = Some(self.store.clock().now_secs());
        task.success = None;
        task.message = CANCELLED_MESSAGE.to_string();

        if let Err(e) = self.notify(NotificationKind::Cancelled, task).await {
            *task = snapshot;
            return Err(e);
        }
        self.commit(task, snapshot, "cancel").await
    }

    /// Record a system-detected failure. Allowed from any status.
    #[instrument(skip(self, task, message), fields(task_id = %task.id))]
    pub async fn errored(&self, task: &mut Task, message: impl Into<String>) -> Result<()> {
        let snapshot = task.clone();
        task.fail = Some(self.store.clock().now_secs());
        task.success = None;
        task.message = message.into();

        self.commit(task, snapshot, "errored").await
    }

    /// Record a successful run and where its output went.
    #[instrument(skip(self, task, result_url, result_hash), fields(task_id = %task.id))]
    pub async fn succeeded(
        &self,
        task: &mut Task,
        result_url: impl Into<String>,
        result_hash: impl Into<String>,
    ) -> Result<()> {
        if !matches!(task.status(), TaskStatus::Running { .. }) {
            return Err(invalid(task, "succeed"));
        }

        let snapshot = task.clone();
        task.success = Some(self.store.clock().now_secs());
        task.fail = None;
        task.result_url = result_url.into();
        task.result_hash = result_hash.into();

        self.commit(task, snapshot, "succeeded").await
    }

    async fn notify(&self, kind: NotificationKind, task: &Task) -> Result<()> {
        let sent = match kind {
            NotificationKind::Requested => self.notifier.send_task_request_email(task).await,
            NotificationKind::Cancelled => self.notifier.send_task_cancel_email(task).await,
        };

        sent.map_err(|e| {
            warn!(kind = kind.as_str(), error = %e, "Notification failed, transition abandoned");
            CoreError::NotificationFailed {
                task_id: task.id.clone(),
                notification: kind.as_str(),
                reason: e.to_string(),
            }
        })
    }

    async fn commit(&self, task: &mut Task, snapshot: Task, operation: &str) -> Result<()> {
        if let Err(e) = self.store.save(task).await {
            *task = snapshot;
            return Err(e);
        }

        info!(
            task_id = %task.id,
            operation,
            status = task.status_str(),
            "Task transition committed"
        );
        Ok(())
    }
}

fn invalid(task: &Task, operation: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        task_id: task.id.clone(),
        operation,
        status: task.status_str(),
    }
}
