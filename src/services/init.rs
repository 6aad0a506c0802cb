//! Initialization helpers for the application:
//! - database connection + migrations
//! - delivery worker spawn helpers
//!
//! This module centralizes bits that would otherwise live in `main.rs`.

use std::{path::Path, sync::Arc};

use anyhow::Result;

use crate::config::Config;
use crate::db::DeliveryQueueRepository;
use crate::services::dispatch::NotificationService;

/// Initialize SQLite database connection and run migrations.
///
/// Creates the parent directory for the database file (if applicable),
/// opens a connection pool using `create_if_missing(true)` and runs migrations.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database");

    // Extract the file path from the database URL
    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Spawn the delivery worker loop.
///
/// The worker polls the delivery queue, claims up to `worker_concurrency` due
/// jobs per cycle under a lease, and processes each claimed batch entry in its
/// own task. The returned `JoinHandle`s let the caller await shutdown. The
/// worker listens for a shutdown notification via a
/// `tokio::sync::broadcast::Sender<()>`.
pub fn spawn_delivery_workers(
    state: Arc<crate::AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let delivery = state.config.delivery.clone();
            loop {
                // Exit early if shutdown requested
                if shutdown_rx.try_recv().is_ok() {
                    tracing::info!("Delivery worker received shutdown signal");
                    break;
                }

                match DeliveryQueueRepository::claim_due(
                    &state.db,
                    delivery.worker_concurrency as i64,
                    delivery.lease_ms,
                )
                .await
                {
                    Ok(jobs) if !jobs.is_empty() => {
                        tracing::debug!(count = jobs.len(), "Claimed due delivery jobs");

                        let mut batch = Vec::with_capacity(jobs.len());
                        for job in jobs {
                            let state = state.clone();
                            batch.push(tokio::spawn(async move {
                                let service = NotificationService::from_state(&state);
                                if let Err(e) = service.process_due_job(job).await {
                                    tracing::warn!("Delivery job processing failed: {:?}", e);
                                }
                            }));
                        }
                        for h in batch {
                            let _ = h.await;
                        }
                        // Drain the backlog without sleeping between full batches.
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Failed to claim delivery jobs: {:?}", e);
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Delivery worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_millis(delivery.poll_interval_ms)) => {}
                }
            }
        }));
    }

    handles
}
