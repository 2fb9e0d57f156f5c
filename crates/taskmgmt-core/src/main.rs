// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Taskmgmt Core - standalone service entry point
//!
//! Resolves configuration, connects the task store and runs migrations, then
//! waits for shutdown. The HTTP layer that drives task transitions embeds the
//! library; this binary is the minimal host for it.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use taskmgmt_core::config::Config;
use taskmgmt_core::lifecycle::TaskManager;
use taskmgmt_core::migrations;
use taskmgmt_core::notify::TracingNotifier;
use taskmgmt_core::persistence::{PostgresPersistence, SqlitePersistence, TaskPersistence};
use taskmgmt_core::store::TaskStore;

/// Environment variable selecting the deployment mode (develop, production, test).
const MODE_ENV: &str = "TASKMGMT_MODE";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskmgmt_core=info".parse()?),
        )
        .init();

    let mode = std::env::var(MODE_ENV).unwrap_or_else(|_| "develop".to_string());
    info!(mode = %mode, "Starting Taskmgmt Core");

    // A missing vital setting must stop the process here.
    let config = Config::resolve(&mode).map_err(|e| {
        error!("Server configuration error: {}", e);
        e
    })?;

    info!(
        listen_addr = %config.listen_addr(),
        url_root = %config.url_root,
        tls = config.tls,
        proxy_force_https = config.proxy_force_https,
        repo = %format!("{}/{}", config.github_repo_owner, config.github_repo_name),
        identity_server = %config.identity_server_url,
        recipients = config.email_notification_recipients.len(),
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let persistence: Arc<dyn TaskPersistence> = if config.postgres_db_url.starts_with("sqlite:") {
        Arc::new(SqlitePersistence::connect(&config.postgres_db_url).await?)
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.postgres_db_url)
            .await?;

        info!("Running database migrations...");
        migrations::run_postgres(&pool).await?;
        Arc::new(PostgresPersistence::new(pool))
    };

    let store = TaskStore::new(persistence);
    if !store.health_check().await? {
        anyhow::bail!("database health check failed");
    }
    info!("Database health check passed");

    let manager = TaskManager::new(store, Arc::new(TracingNotifier::from_config(&config)));
    let recent = manager.store().list(10, 0).await?;
    for task in &recent {
        info!(
            task_id = %task.id,
            title = %task.title,
            status = task.status_str(),
            "Known task"
        );
    }

    info!("Taskmgmt Core initialized successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    info!("Shutdown complete");
    Ok(())
}
