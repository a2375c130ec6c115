//! Fairway API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fairway_common::config::AppConfig;
use fairway_common::db::create_pool;
use fairway_common::queue::RedisQueue;
use fairway_common::redis_pool::create_redis_pool;

use fairway_api::routes::create_router;
use fairway_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("fairway_api=debug,fairway_dispatch=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Fairway API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Migrations applied");

    // Create Redis-backed delivery queue
    let redis = create_redis_pool(&config.redis_url).await?;
    let queue = Arc::new(RedisQueue::new(redis));
    tracing::info!("Redis connection established");

    // Build application state
    let state = AppState::new(pool, queue, config);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
