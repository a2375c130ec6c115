use std::sync::Arc;
use std::time::Duration;

use fairway_common::config::AppConfig;
use fairway_common::db;
use fairway_common::queue::RedisQueue;
use fairway_common::redis_pool::create_redis_pool;

use fairway_worker::alert::AlertNotifier;
use fairway_worker::cleanup::CleanupTask;
use fairway_worker::delivery::DeliveryWorker;
use fairway_worker::mailer::{Mailer, ResendMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairway_worker=info,fairway_dispatch=info".into()),
        )
        .json()
        .init();

    tracing::info!("Fairway delivery worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Connect to Redis
    let redis = create_redis_pool(&config.redis_url).await?;
    let queue = RedisQueue::new(redis);

    // Mail transport
    let api_key = config
        .resend_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("RESEND_API_KEY is required for the worker"))?;
    let from = config
        .email_from
        .clone()
        .ok_or_else(|| anyhow::anyhow!("EMAIL_FROM is required for the worker"))?;
    let mailer: Arc<dyn Mailer> = Arc::new(ResendMailer::new(api_key, from)?);

    let alerts = AlertNotifier::new(mailer.clone(), config.alert_emails.clone());
    let worker = Arc::new(DeliveryWorker::new(
        pool.clone(),
        Arc::new(queue.clone()),
        mailer,
        alerts,
    ));

    // Spawn consumer tasks
    let mut handles = Vec::with_capacity(config.worker_count);
    for i in 0..config.worker_count {
        let worker = worker.clone();
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            tracing::info!(consumer = i, "Delivery consumer started");
            worker.run(queue).await;
        }));
    }

    // Spawn retention cleanup
    let cleanup = CleanupTask::new(
        pool,
        config.retention_days,
        Duration::from_secs(config.cleanup_interval_hours * 3600),
    );
    handles.push(tokio::spawn(async move { cleanup.run().await }));

    tracing::info!(
        consumers = config.worker_count,
        "Fairway delivery worker running"
    );

    // Run until shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping gracefully...");

    for handle in handles {
        handle.abort();
    }

    tracing::info!("Fairway delivery worker stopped.");
    Ok(())
}
