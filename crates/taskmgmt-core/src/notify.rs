// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Notifications sent when a task is requested or cancelled.
//!
//! Delivery itself lives outside this crate. [`TracingNotifier`] composes the
//! message and records it as a tracing event, which is what the standalone
//! binary wires in.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;
use crate::task::Task;

/// Which lifecycle event a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A run was requested.
    Requested,
    /// A running task was cancelled.
    Cancelled,
}

impl NotificationKind {
    /// Short label used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "task requested",
            Self::Cancelled => "task cancelled",
        }
    }
}

/// Receives run and cancel events for interested parties.
#[async_trait]
pub trait TaskNotifier: Send + Sync {
    /// A run was requested for `task`.
    async fn send_task_request_email(&self, task: &Task) -> anyhow::Result<()>;

    /// `task` was cancelled.
    async fn send_task_cancel_email(&self, task: &Task) -> anyhow::Result<()>;
}

/// A composed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNotification {
    /// What happened.
    pub kind: NotificationKind,
    /// Who should hear about it.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl TaskNotification {
    /// Compose the notification for `task`. `url_root` prefixes the task link.
    pub fn compose(
        kind: NotificationKind,
        task: &Task,
        recipients: &[String],
        url_root: &str,
    ) -> Self {
        let subject = match kind {
            NotificationKind::Requested => format!("Task Requested: {}", task.title),
            NotificationKind::Cancelled => format!("Task Cancelled: {}", task.title),
        };

        let mut body = format!(
            "Task: {}\nId: {}\nStatus: {}\nRepo: {} @ {}\nSource: {} ({})\n",
            task.title,
            task.id,
            task.status_str(),
            task.repo_url,
            task.repo_commit,
            task.source_url,
            task.source_checksum,
        );
        if !task.message.is_empty() {
            body.push_str(&format!("Message: {}\n", task.message));
        }
        if !url_root.is_empty() && !task.id.is_empty() {
            body.push_str(&format!(
                "Link: {}/tasks/{}\n",
                url_root.trim_end_matches('/'),
                task.id
            ));
        }

        Self {
            kind,
            recipients: recipients.to_vec(),
            subject,
            body,
        }
    }
}

/// Notifier that records composed notifications as tracing events.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier {
    recipients: Vec<String>,
    url_root: String,
}

impl TracingNotifier {
    /// Create a notifier for the given recipients.
    pub fn new(recipients: Vec<String>, url_root: impl Into<String>) -> Self {
        Self {
            recipients,
            url_root: url_root.into(),
        }
    }

    /// Recipients and link root taken from resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.email_notification_recipients.clone(),
            config.url_root.clone(),
        )
    }

    fn emit(&self, kind: NotificationKind, task: &Task) -> TaskNotification {
        let notification = TaskNotification::compose(kind, task, &self.recipients, &self.url_root);
        if notification.recipients.is_empty() {
            warn!(
                task_id = %task.id,
                kind = kind.as_str(),
                "No notification recipients configured"
            );
        } else {
            info!(
                task_id = %task.id,
                kind = kind.as_str(),
                recipients = %notification.recipients.join(","),
                subject = %notification.subject,
                "Task notification"
            );
        }
        notification
    }
}

#[async_trait]
impl TaskNotifier for TracingNotifier {
    async fn send_task_request_email(&self, task: &Task) -> anyhow::Result<()> {
        self.emit(NotificationKind::Requested, task);
        Ok(())
    }

    async fn send_task_cancel_email(&self, task: &Task) -> anyhow::Result<()> {
        self.emit(NotificationKind::Cancelled, task);
        Ok(())
    }
}
