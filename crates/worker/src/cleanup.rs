//! Retention cleanup.
//!
//! Deletes sent batches (and, by cascade, their records) older than the
//! retention window. Best-effort maintenance: a failed run is logged and
//! the next interval tries again, with no retry logic of its own.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use fairway_common::error::AppError;
use fairway_dispatch::repository::BatchRepo;

pub struct CleanupTask {
    pool: PgPool,
    retention_days: u32,
    interval: Duration,
}

impl CleanupTask {
    pub fn new(pool: PgPool, retention_days: u32, interval: Duration) -> Self {
        Self {
            pool,
            retention_days,
            interval,
        }
    }

    /// Delete sent batches past the retention window. Returns how many were
    /// deleted.
    pub async fn run_once(&self) -> Result<u64, AppError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days as i64);
        let deleted = BatchRepo::delete_sent_older_than(&self.pool, cutoff).await?;

        if deleted > 0 {
            tracing::info!(deleted, retention_days = self.retention_days, "Cleanup removed old batches");
        } else {
            tracing::debug!(retention_days = self.retention_days, "Cleanup found nothing to remove");
        }

        Ok(deleted)
    }

    /// Run the cleanup on a fixed interval until the task is cancelled.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "Cleanup run failed");
            }
        }
    }
}
