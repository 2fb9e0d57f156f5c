// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The task entity and its derived lifecycle status.
//!
//! A task stores three optional timestamps (`request`, `success`, `fail`).
//! Status is never stored; [`Task::status`] derives it:
//!
//! | request | success | fail | status |
//! |---------|---------|------|--------|
//! | unset   | -       | -    | `ready` |
//! | set     | unset   | unset| `running` |
//! | set     | set     | -    | `finished` |
//! | set     | unset   | set  | `failed` |
//!
//! ```text
//!   ┌───────┐  run   ┌─────────┐ succeeded ┌──────────┐
//!   │ READY │───────►│ RUNNING │──────────►│ FINISHED │
//!   └───────┘        └────┬────┘           └──────────┘
//!                  cancel │ ▲
//!                 errored │ │ run (re-run)
//!                         ▼ │
//!                     ┌────────┐
//!                     │ FAILED │
//!                     └────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A unit of archival work.
///
/// Field names on the wire follow the legacy encoding, except that the
/// repository location is `repoUrl` rather than a second `repoCommit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier; empty until the task is first saved.
    #[serde(default)]
    pub id: String,
    /// When the task was first saved.
    #[serde(default)]
    pub created: DateTime<Utc>,
    /// When the task was last saved.
    #[serde(default)]
    pub updated: DateTime<Utc>,
    /// Human-readable label.
    #[serde(rename = "name")]
    pub title: String,
    /// When a run was requested. `None` means never run.
    pub request: Option<DateTime<Utc>>,
    /// When the last run succeeded.
    pub success: Option<DateTime<Utc>>,
    /// When the last run failed or was cancelled.
    pub fail: Option<DateTime<Utc>>,
    /// Where the code to execute lives, e.g. `https://github.com/ipfs/ipfs-wiki/mirror`.
    #[serde(default)]
    pub repo_url: String,
    /// Version control reference to execute the code from.
    #[serde(default)]
    pub repo_commit: String,
    /// Input data this task operates on.
    #[serde(default)]
    pub source_url: String,
    /// Checksum of the input data.
    #[serde(default)]
    pub source_checksum: String,
    /// Where the output was written. Set on success.
    #[serde(default)]
    pub result_url: String,
    /// Content hash of the output. Set on success.
    #[serde(default)]
    pub result_hash: String,
    /// Free-text status or failure annotation.
    #[serde(default)]
    pub message: String,
}

/// Derived lifecycle status, carrying the timestamps that define it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus<'a> {
    /// Never run.
    Ready,
    /// Run requested, no outcome yet.
    Running {
        /// When the run was requested.
        requested_at: DateTime<Utc>,
    },
    /// Last run succeeded.
    Finished {
        /// When the run was requested.
        requested_at: DateTime<Utc>,
        /// When it succeeded.
        succeeded_at: DateTime<Utc>,
    },
    /// Last run failed or was cancelled.
    Failed {
        /// When the run was requested.
        requested_at: DateTime<Utc>,
        /// When it failed.
        failed_at: DateTime<Utc>,
        /// Failure annotation.
        message: &'a str,
    },
}

impl TaskStatus<'_> {
    /// Lowercase status name: `ready`, `running`, `finished` or `failed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running { .. } => "running",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
        }
    }

    /// What a caller can do next, if anything.
    pub fn next_action(&self) -> Option<NextAction> {
        match self {
            Self::Ready => Some(NextAction::Run),
            Self::Running { .. } => Some(NextAction::Cancel),
            Self::Failed { .. } => Some(NextAction::ReRun),
            Self::Finished { .. } => None,
        }
    }
}

impl std::fmt::Display for TaskStatus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggested next step for a caller-facing UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Start a ready task.
    Run,
    /// Stop a running task.
    Cancel,
    /// Start a failed task again.
    ReRun,
}

impl NextAction {
    /// Button label.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Cancel => "cancel",
            Self::ReRun => "re-run",
        }
    }

    /// Endpoint that performs the action for `task_id`.
    pub fn url(&self, task_id: &str) -> String {
        match self {
            Self::Run | Self::ReRun => format!("/tasks/run/{}", task_id),
            Self::Cancel => format!("/tasks/cancel/{}", task_id),
        }
    }
}

impl Task {
    /// A new, unsaved task.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Derive the lifecycle status from `request`, `success` and `fail`.
    pub fn status(&self) -> TaskStatus<'_> {
        match (self.request, self.success, self.fail) {
            (None, _, _) => TaskStatus::Ready,
            (Some(requested_at), Some(succeeded_at), _) => TaskStatus::Finished {
                requested_at,
                succeeded_at,
            },
            (Some(requested_at), None, Some(failed_at)) => TaskStatus::Failed {
                requested_at,
                failed_at,
                message: &self.message,
            },
            (Some(requested_at), None, None) => TaskStatus::Running { requested_at },
        }
    }

    /// Lowercase status name.
    pub fn status_str(&self) -> &'static str {
        self.status().as_str()
    }

    /// Has this task been saved at least once?
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// URL of the next action; errors once the task is finished.
    pub fn next_action_url(&self) -> Result<String, CoreError> {
        self.next_action().map(|action| action.url(&self.id))
    }

    /// Label of the next action; errors once the task is finished.
    pub fn next_action_title(&self) -> Result<&'static str, CoreError> {
        self.next_action().map(|action| action.title())
    }

    fn next_action(&self) -> Result<NextAction, CoreError> {
        self.status()
            .next_action()
            .ok_or_else(|| CoreError::NoNextAction {
                task_id: self.id.clone(),
            })
    }
}
