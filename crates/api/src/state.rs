//! Shared application state for the Axum API server.

use std::sync::Arc;

use fairway_common::config::AppConfig;
use fairway_common::queue::JobQueue;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: Arc<dyn JobQueue>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, queue: Arc<dyn JobQueue>, config: AppConfig) -> Self {
        Self {
            pool,
            queue,
            config,
        }
    }
}
