// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for taskmgmt-core integration tests.
//!
//! Provides in-memory SQLite stores and a PostgreSQL store gated on
//! `TEST_DATABASE_URL`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use sqlx::sqlite::SqlitePoolOptions;

use taskmgmt_core::clock::ManualClock;
use taskmgmt_core::migrations;
use taskmgmt_core::notify::{NotificationKind, TaskNotifier};
use taskmgmt_core::persistence::{PostgresPersistence, SqlitePersistence};
use taskmgmt_core::store::TaskStore;
use taskmgmt_core::task::Task;

/// Fixed starting instant for clock-driven tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap()
}

/// Store backed by a fresh in-memory SQLite database.
pub async fn sqlite_store(clock: Arc<ManualClock>) -> TaskStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    migrations::run_sqlite(&pool)
        .await
        .expect("Failed to run migrations");

    TaskStore::with_clock(Arc::new(SqlitePersistence::new(pool)), clock)
}

/// Store backed by the database at `TEST_DATABASE_URL`, if one is reachable.
pub async fn postgres_store(clock: Arc<ManualClock>) -> Option<(TaskStore, PgPool)> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&database_url).await.ok()?;
    migrations::run_postgres(&pool).await.ok()?;

    let store = TaskStore::with_clock(Arc::new(PostgresPersistence::new(pool.clone())), clock);
    Some((store, pool))
}

/// Notifier that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl TaskNotifier for RecordingNotifier {
    async fn send_task_request_email(&self, task: &Task) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((NotificationKind::Requested, task.id.clone()));
        Ok(())
    }

    async fn send_task_cancel_email(&self, task: &Task) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((NotificationKind::Cancelled, task.id.clone()));
        Ok(())
    }
}

/// Skip test if no database URL is configured.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}
