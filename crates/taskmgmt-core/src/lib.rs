// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Taskmgmt Core - Archival Task Lifecycle
//!
//! This crate tracks units of archival work ("tasks") through their lifecycle
//! and persists every transition to a relational store. It also resolves the
//! service configuration at startup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 HTTP / API layer (embedding service)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                 │ run / cancel                  │ errored / succeeded
//!                 ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            TaskManager                                   │
//! │        transition guards, snapshot + rollback, notifications             │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           │ save / find / delete                         │ requested / cancelled
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │      TaskStore        │                    │        TaskNotifier         │
//! │  upsert-by-presence   │                    │   (email, tracing, ...)     │
//! └───────────────────────┘                    └─────────────────────────────┘
//!           │
//!           ▼
//! ┌───────────────────────┐
//! │ PostgreSQL / SQLite   │
//! │    (tasks table)      │
//! └───────────────────────┘
//! ```
//!
//! # Task Status
//!
//! Status is derived from three nullable timestamps, see [`task`].
//!
//! | Status | Next action |
//! |--------|-------------|
//! | `ready` | `run` |
//! | `running` | `cancel` |
//! | `failed` | `re-run` |
//! | `finished` | none (reported as [`error::CoreError::NoNextAction`]) |
//!
//! # Configuration
//!
//! Resolved once from `config.<mode>.json` / `config.json` and environment
//! variables, see [`config`]. A resolution error is fatal: the process must
//! not start.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taskmgmt_core::{Config, PostgresPersistence, Task, TaskManager, TaskStore, TracingNotifier};
//!
//! let config = Config::resolve("production")?;
//! let pool = sqlx::PgPool::connect(&config.postgres_db_url).await?;
//! let store = TaskStore::new(Arc::new(PostgresPersistence::new(pool)));
//! let manager = TaskManager::new(store, Arc::new(TracingNotifier::from_config(&config)));
//!
//! let mut task = Task::new("mirror ipfs wiki");
//! manager.store().save(&mut task).await?;
//! manager.run(&mut task).await?;
//! ```

#![deny(missing_docs)]

/// Time source used to stamp tasks.
pub mod clock;

/// Configuration resolved from files and environment variables.
pub mod config;

/// Error types for task operations.
pub mod error;

/// Lifecycle transitions (run, cancel, errored, succeeded).
pub mod lifecycle;

/// Embedded database migrations.
pub mod migrations;

/// Notification collaborator interface.
pub mod notify;

/// Raw task persistence backends (PostgreSQL, SQLite).
pub mod persistence;

/// Identity lookup and upsert persistence.
pub mod store;

/// The task entity and its derived status.
pub mod task;

pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError, ConfigResolver};
pub use error::{CoreError, Result};
pub use lifecycle::TaskManager;
pub use notify::{NotificationKind, TaskNotifier, TracingNotifier};
pub use persistence::{PostgresPersistence, SqlitePersistence, TaskPersistence};
pub use store::TaskStore;
pub use task::{NextAction, Task, TaskStatus};
