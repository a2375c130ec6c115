//! Bulk dispatch across multiple tournaments.
//!
//! Dispatches sequentially with a fixed sleep between tournaments so the
//! mail transport never sees the whole season at once. Individual failures
//! are recorded in the result list and do not stop the run.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use fairway_common::queue::JobQueue;

use crate::dispatch::{DispatchService, DispatchSummary, SendOptions};

/// Outcome of one tournament within a bulk run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BulkItemOutcome {
    pub tournament_id: Uuid,
    pub summary: Option<DispatchSummary>,
    pub error: Option<String>,
}

pub struct BulkDispatchService;

impl BulkDispatchService {
    /// Dispatch notifications for each tournament in turn, sleeping `delay`
    /// between tournaments.
    pub async fn send_all(
        pool: &PgPool,
        queue: &dyn JobQueue,
        tournament_ids: &[Uuid],
        year: i32,
        options: &SendOptions,
        institutional_emails: &[String],
        delay: Duration,
    ) -> Vec<BulkItemOutcome> {
        let mut outcomes = Vec::with_capacity(tournament_ids.len());

        for (i, &tournament_id) in tournament_ids.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match DispatchService::send(
                pool,
                queue,
                tournament_id,
                year,
                options,
                institutional_emails,
            )
            .await
            {
                Ok(summary) => {
                    outcomes.push(BulkItemOutcome {
                        tournament_id,
                        summary: Some(summary),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        tournament_id = %tournament_id,
                        error = %e,
                        "Bulk dispatch item failed"
                    );
                    outcomes.push(BulkItemOutcome {
                        tournament_id,
                        summary: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        tracing::info!(
            total = outcomes.len(),
            succeeded = outcomes.iter().filter(|o| o.error.is_none()).count(),
            "Bulk dispatch complete"
        );

        outcomes
    }
}
