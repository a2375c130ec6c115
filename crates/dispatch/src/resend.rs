//! Resend — re-queues delivery for a batch's failed records.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fairway_common::error::AppError;
use fairway_common::queue::{DeliveryJob, JobQueue};
use fairway_common::types::{BatchStatus, NotificationBatch};

use crate::repository::{BatchRepo, RecordRepo};

/// Result of a resend: records re-queued vs. records that could not be
/// reset (another operator got to them first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResendOutcome {
    pub resent: u32,
    pub failed: u32,
}

/// Whether a batch may be resent: it must have failed at least partially,
/// and enough time must have passed since the last attempt.
pub fn can_be_resent(
    batch: &NotificationBatch,
    cooldown_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    if !matches!(batch.status, BatchStatus::Failed | BatchStatus::Partial) {
        return false;
    }
    match batch.sent_at {
        Some(sent_at) => now - sent_at >= Duration::minutes(cooldown_minutes),
        None => true,
    }
}

pub struct ResendService;

impl ResendService {
    /// Reset this batch's failed records to pending with a fresh delivery
    /// budget and re-enqueue them from attempt one. A record only reaches
    /// `failed` by exhausting its retries, so a resend that kept the old
    /// count would never re-queue anything. Sent records are untouched.
    pub async fn resend(
        pool: &PgPool,
        queue: &dyn JobQueue,
        batch_id: Uuid,
        cooldown_minutes: i64,
    ) -> Result<ResendOutcome, AppError> {
        let batch = BatchRepo::get(pool, batch_id).await?;

        if !can_be_resent(&batch, cooldown_minutes, Utc::now()) {
            return Err(AppError::Conflict(format!(
                "Batch {} cannot be resent (status {}, cooldown {} min)",
                batch_id, batch.status, cooldown_minutes
            )));
        }

        let failed_records = RecordRepo::failed_by_batch(pool, batch_id).await?;
        let mut outcome = ResendOutcome::default();

        for record in &failed_records {
            if !RecordRepo::reset_pending(pool, record.id).await? {
                // Raced with another operator.
                outcome.failed += 1;
                continue;
            }

            queue
                .enqueue(
                    DeliveryJob {
                        record_id: record.id,
                        attempt: 1,
                    },
                    record.priority,
                )
                .await?;
            outcome.resent += 1;
        }

        if outcome.resent > 0 {
            BatchRepo::refresh_status(pool, batch_id).await?;
        }

        tracing::info!(
            batch_id = %batch_id,
            resent = outcome.resent,
            failed = outcome.failed,
            "Batch resend complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(status: BatchStatus, sent_minutes_ago: Option<i64>) -> NotificationBatch {
        NotificationBatch {
            id: Uuid::new_v4(),
            tournament_id: Uuid::new_v4(),
            status,
            total_recipients: 5,
            details: serde_json::json!({}),
            sent_by: Some("op".into()),
            sent_at: sent_minutes_ago.map(|m| Utc::now() - Duration::minutes(m)),
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resendable_after_cooldown() {
        assert!(can_be_resent(
            &batch(BatchStatus::Failed, Some(60)),
            30,
            Utc::now()
        ));
        assert!(can_be_resent(
            &batch(BatchStatus::Partial, Some(31)),
            30,
            Utc::now()
        ));
    }

    #[test]
    fn test_not_resendable_within_cooldown() {
        assert!(!can_be_resent(
            &batch(BatchStatus::Failed, Some(10)),
            30,
            Utc::now()
        ));
    }

    #[test]
    fn test_not_resendable_in_wrong_status() {
        assert!(!can_be_resent(&batch(BatchStatus::Sent, Some(60)), 30, Utc::now()));
        assert!(!can_be_resent(
            &batch(BatchStatus::Pending, Some(60)),
            30,
            Utc::now()
        ));
    }
}
