// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for taskmgmt-core.
//!
//! This module exposes embedded migrations that can be run programmatically.
//! Services embedding taskmgmt-core call these to set up the `tasks` table.
//!
//! # Example
//!
//! ```ignore
//! use sqlx::PgPool;
//! use taskmgmt_core::migrations;
//!
//! let pool = PgPool::connect(&config.postgres_db_url).await?;
//! migrations::run_postgres(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// PostgreSQL migrator with all task migrations embedded.
pub static POSTGRES: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

/// SQLite migrator with all task migrations embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run PostgreSQL migrations.
///
/// Safe to call multiple times; already-applied migrations are skipped.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Run SQLite migrations.
///
/// Safe to call multiple times; already-applied migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
