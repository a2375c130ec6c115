//! Delivery worker — performs one email send per job, with retry and
//! backoff.
//!
//! All coordination goes through the record's persisted `status`: each
//! invocation checks `status == pending` before acting, so duplicate queue
//! deliveries are no-ops. The record's `retry_count` column is the attempt
//! counter of truth; the backoff table maps it to the next delay.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use fairway_common::error::AppError;
use fairway_common::queue::{DeliveryJob, JobQueue, RedisQueue};
use fairway_common::types::{
    BACKOFF_SECONDS, MAX_DELIVERY_ATTEMPTS, NotificationRecord, RecordStatus,
};
use fairway_dispatch::repository::{BatchRepo, RecordRepo};

use crate::alert::AlertNotifier;
use crate::mailer::{Mailer, OutboundEmail};

/// How long a consumer blocks waiting for the next job.
const POP_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do with a record when its job arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    /// Not pending — duplicate or stale job, do nothing.
    Skip,
    /// Deadline passed before delivery — cancel, no send.
    Cancel,
    /// Scheduled in the future — re-enqueue with the remaining delay.
    Defer(Duration),
    /// Due now — attempt delivery.
    Attempt,
}

/// Decide what to do with a record as of `now`.
pub fn disposition(record: &NotificationRecord, now: DateTime<Utc>) -> RecordDisposition {
    if record.status != RecordStatus::Pending {
        return RecordDisposition::Skip;
    }
    if let Some(expires_at) = record.expires_at
        && expires_at <= now
    {
        return RecordDisposition::Cancel;
    }
    if let Some(scheduled_at) = record.scheduled_at
        && scheduled_at > now
    {
        let remaining = (scheduled_at - now).to_std().unwrap_or(Duration::ZERO);
        return RecordDisposition::Defer(remaining);
    }
    RecordDisposition::Attempt
}

/// Delay before the next attempt, given the number of attempts already made.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let index = (retry_count.max(1) as usize - 1).min(BACKOFF_SECONDS.len() - 1);
    Duration::from_secs(BACKOFF_SECONDS[index])
}

/// Consumes delivery jobs and drives records through their state machine.
pub struct DeliveryWorker {
    pool: PgPool,
    queue: Arc<dyn JobQueue>,
    mailer: Arc<dyn Mailer>,
    alerts: AlertNotifier,
}

impl DeliveryWorker {
    pub fn new(
        pool: PgPool,
        queue: Arc<dyn JobQueue>,
        mailer: Arc<dyn Mailer>,
        alerts: AlertNotifier,
    ) -> Self {
        Self {
            pool,
            queue,
            mailer,
            alerts,
        }
    }

    /// Process one delivery job. Delivery failures are handled through the
    /// record's state; only infrastructure errors (database, queue) come
    /// back as `Err`.
    pub async fn process(&self, job: &DeliveryJob) -> Result<(), AppError> {
        let Some(record) = RecordRepo::get(&self.pool, job.record_id).await? else {
            tracing::warn!(record_id = %job.record_id, "Job references missing record");
            return Ok(());
        };

        match disposition(&record, Utc::now()) {
            RecordDisposition::Skip => {
                tracing::debug!(
                    record_id = %record.id,
                    status = %record.status,
                    "Record not pending, skipping"
                );
                Ok(())
            }
            RecordDisposition::Cancel => {
                RecordRepo::mark_cancelled(&self.pool, record.id).await?;
                BatchRepo::refresh_status(&self.pool, record.batch_id).await?;
                tracing::info!(record_id = %record.id, "Record expired before delivery, cancelled");
                Ok(())
            }
            RecordDisposition::Defer(remaining) => {
                self.queue
                    .enqueue_delayed(job.clone(), record.priority, remaining)
                    .await?;
                tracing::debug!(
                    record_id = %record.id,
                    delay_secs = remaining.as_secs(),
                    "Record scheduled for later, deferred"
                );
                Ok(())
            }
            RecordDisposition::Attempt => self.attempt(&record, job).await,
        }
    }

    async fn attempt(&self, record: &NotificationRecord, job: &DeliveryJob) -> Result<(), AppError> {
        tracing::info!(
            record_id = %record.id,
            batch_id = %record.batch_id,
            recipient = %record.recipient_email,
            attempt = job.attempt,
            "Attempting delivery"
        );

        let email = OutboundEmail {
            to: record.recipient_email.clone(),
            subject: record.subject.clone(),
            body: record.body.clone(),
            attachments: Vec::new(),
        };

        match self.mailer.send(&email).await {
            Ok(()) => {
                RecordRepo::mark_sent(&self.pool, record.id).await?;
                let batch_status = BatchRepo::refresh_status(&self.pool, record.batch_id).await?;
                tracing::info!(
                    record_id = %record.id,
                    batch_id = %record.batch_id,
                    batch_status = %batch_status,
                    "Delivery succeeded"
                );
                Ok(())
            }
            Err(e) => self.handle_failure(record, &e.to_string()).await,
        }
    }

    async fn handle_failure(
        &self,
        record: &NotificationRecord,
        error: &str,
    ) -> Result<(), AppError> {
        let retry_count = RecordRepo::record_failure(&self.pool, record.id, error).await?;

        if retry_count >= MAX_DELIVERY_ATTEMPTS {
            RecordRepo::mark_failed(&self.pool, record.id).await?;
            let batch_status = BatchRepo::refresh_status(&self.pool, record.batch_id).await?;

            tracing::error!(
                record_id = %record.id,
                batch_id = %record.batch_id,
                batch_status = %batch_status,
                retry_count,
                error,
                "Delivery failed permanently"
            );

            self.alerts
                .record_exhausted(record, retry_count, error, batch_status)
                .await;
            return Ok(());
        }

        let delay = backoff_delay(retry_count);
        self.queue
            .enqueue_delayed(
                DeliveryJob {
                    record_id: record.id,
                    attempt: retry_count as u32 + 1,
                },
                record.priority,
                delay,
            )
            .await?;

        tracing::warn!(
            record_id = %record.id,
            retry_count,
            retry_in_secs = delay.as_secs(),
            error,
            "Delivery failed, retry scheduled"
        );
        Ok(())
    }

    /// Consumer loop: pop jobs from the Redis queue until cancelled.
    pub async fn run(&self, queue: RedisQueue) {
        loop {
            match queue.pop(POP_TIMEOUT).await {
                Ok(Some(job)) => {
                    if let Err(e) = self.process(&job).await {
                        tracing::error!(record_id = %job.record_id, error = %e, "Job processing failed");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Queue pop failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use fairway_common::types::{Priority, RecipientType};
    use uuid::Uuid;

    fn record(status: RecordStatus) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            recipient_type: RecipientType::Referee,
            recipient_name: "A".into(),
            recipient_email: "a@x.it".into(),
            subject: "s".into(),
            body: "b".into(),
            status,
            priority: Priority::Normal,
            retry_count: 0,
            scheduled_at: None,
            expires_at: None,
            sent_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_non_pending_records_skip() {
        let now = Utc::now();
        for status in [
            RecordStatus::Sent,
            RecordStatus::Failed,
            RecordStatus::Cancelled,
        ] {
            assert_eq!(disposition(&record(status), now), RecordDisposition::Skip);
        }
    }

    #[test]
    fn test_expired_record_cancels() {
        let now = Utc::now();
        let mut r = record(RecordStatus::Pending);
        r.expires_at = Some(now - ChronoDuration::minutes(1));
        assert_eq!(disposition(&r, now), RecordDisposition::Cancel);
    }

    #[test]
    fn test_expiry_checked_before_schedule() {
        let now = Utc::now();
        let mut r = record(RecordStatus::Pending);
        r.expires_at = Some(now - ChronoDuration::minutes(1));
        r.scheduled_at = Some(now + ChronoDuration::minutes(5));
        assert_eq!(disposition(&r, now), RecordDisposition::Cancel);
    }

    #[test]
    fn test_future_schedule_defers_with_remaining_time() {
        let now = Utc::now();
        let mut r = record(RecordStatus::Pending);
        r.scheduled_at = Some(now + ChronoDuration::seconds(90));
        match disposition(&r, now) {
            RecordDisposition::Defer(remaining) => {
                assert!(remaining >= Duration::from_secs(89));
                assert!(remaining <= Duration::from_secs(90));
            }
            other => panic!("expected Defer, got {:?}", other),
        }
    }

    #[test]
    fn test_due_record_attempts() {
        let now = Utc::now();
        let mut r = record(RecordStatus::Pending);
        r.scheduled_at = Some(now - ChronoDuration::seconds(1));
        r.expires_at = Some(now + ChronoDuration::hours(1));
        assert_eq!(disposition(&r, now), RecordDisposition::Attempt);
    }

    #[test]
    fn test_backoff_table() {
        assert_eq!(backoff_delay(1), Duration::from_secs(30));
        assert_eq!(backoff_delay(2), Duration::from_secs(60));
        assert_eq!(backoff_delay(3), Duration::from_secs(120));
        // Out-of-range counts clamp to the table bounds
        assert_eq!(backoff_delay(0), Duration::from_secs(30));
        assert_eq!(backoff_delay(10), Duration::from_secs(120));
    }
}
