// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for taskmgmt-core.
//!
//! Provides a unified error type for task lookup, persistence, notification and
//! lifecycle failures. Configuration failures live in [`crate::config::ConfigError`].

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// No task record matches the identifier (or the identifier is empty).
    TaskNotFound {
        /// The task ID that was not found.
        task_id: String,
    },

    /// A lifecycle operation was requested from a status that does not allow it.
    InvalidTransition {
        /// The task ID.
        task_id: String,
        /// The operation that was attempted (run, cancel, succeeded).
        operation: &'static str,
        /// The derived status at the time of the attempt.
        status: &'static str,
    },

    /// The task is finished; there is nothing left for a caller to do with it.
    NoNextAction {
        /// The task ID.
        task_id: String,
    },

    /// The notification collaborator rejected a run or cancel notification.
    NotificationFailed {
        /// The task ID.
        task_id: String,
        /// Which notification was being sent.
        notification: &'static str,
        /// The reason for failure.
        reason: String,
    },

    /// Backing store operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TaskNotFound { .. } => "TASK_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NoNextAction { .. } => "NO_NEXT_ACTION",
            Self::NotificationFailed { .. } => "NOTIFICATION_FAILED",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    /// Shorthand for a [`CoreError::TaskNotFound`].
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    /// True for the not-found sentinel used to pick insert over update.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. })
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskNotFound { task_id } => {
                if task_id.is_empty() {
                    write!(f, "Task not found: empty identifier")
                } else {
                    write!(f, "Task '{}' not found", task_id)
                }
            }
            Self::InvalidTransition {
                task_id,
                operation,
                status,
            } => {
                write!(
                    f,
                    "Cannot {} task '{}' while it is {}",
                    operation, task_id, status
                )
            }
            Self::NoNextAction { task_id } => {
                write!(f, "Task '{}' is finished: no next action", task_id)
            }
            Self::NotificationFailed {
                task_id,
                notification,
                reason,
            } => {
                write!(
                    f,
                    "Failed to send {} notification for task '{}': {}",
                    notification, task_id, reason
                )
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}
