//! Named repository queries for the notification core.
//!
//! All persistence access for batches, records and their tournament context
//! goes through these functions; services never embed ad hoc SQL. Every
//! tournament query takes the year as an explicit parameter.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fairway_common::error::AppError;
use fairway_common::types::{
    BatchDetails, BatchStatus, CategoryCounts, Club, ConfirmedAssignment, NotificationBatch,
    NotificationRecord, Priority, RecipientType, RecordStatus, Tournament,
};

/// Per-status record counts for one batch.
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
}

/// Aggregate counters for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct NotificationStats {
    pub total_batches: i64,
    pub batches_sent: i64,
    pub batches_partial: i64,
    pub batches_failed: i64,
    pub batches_pending: i64,
    pub total_records: i64,
    pub records_sent: i64,
    pub records_failed: i64,
}

/// Fields for a new notification record, before insertion.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub batch_id: Uuid,
    pub recipient_type: RecipientType,
    pub recipient_name: String,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Aggregate batch status over its records' statuses.
///
/// `sent` iff every record is sent; `failed` iff none are; `partial`
/// otherwise. While any record is still pending the batch stays pending.
pub fn aggregate_status(counts: &StatusCounts) -> BatchStatus {
    if counts.total == 0 || counts.pending > 0 {
        return BatchStatus::Pending;
    }
    if counts.sent == counts.total {
        BatchStatus::Sent
    } else if counts.sent == 0 {
        BatchStatus::Failed
    } else {
        BatchStatus::Partial
    }
}

/// Tournament context reads.
pub struct TournamentRepo;

impl TournamentRepo {
    /// Fetch a tournament by id within an explicit year.
    pub async fn get(pool: &PgPool, id: Uuid, year: i32) -> Result<Tournament, AppError> {
        let tournament: Tournament =
            sqlx::query_as("SELECT * FROM tournaments WHERE id = $1 AND year = $2")
                .bind(id)
                .bind(year)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Tournament {} not found in year {}", id, year))
                })?;

        Ok(tournament)
    }

    /// Fetch the host club for a tournament.
    pub async fn get_club(pool: &PgPool, club_id: Uuid) -> Result<Club, AppError> {
        let club: Club = sqlx::query_as("SELECT * FROM clubs WHERE id = $1")
            .bind(club_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Club {} not found", club_id)))?;

        Ok(club)
    }

    /// Confirmed assignments for a tournament, joined with referee contacts.
    pub async fn confirmed_assignments(
        pool: &PgPool,
        tournament_id: Uuid,
    ) -> Result<Vec<ConfirmedAssignment>, AppError> {
        let assignments: Vec<ConfirmedAssignment> = sqlx::query_as(
            r#"
            SELECT a.referee_id, r.name AS referee_name, r.email AS referee_email,
                   a.role, r.level
            FROM assignments a
            JOIN referees r ON a.referee_id = r.id
            WHERE a.tournament_id = $1 AND a.status = 'confirmed'
            ORDER BY r.name
            "#,
        )
        .bind(tournament_id)
        .fetch_all(pool)
        .await?;

        Ok(assignments)
    }
}

/// Batch reads and writes.
pub struct BatchRepo;

impl BatchRepo {
    /// Insert a new pending batch for a tournament.
    pub async fn create(
        pool: &PgPool,
        tournament_id: Uuid,
        sent_by: &str,
    ) -> Result<NotificationBatch, AppError> {
        let batch: NotificationBatch = sqlx::query_as(
            r#"
            INSERT INTO notification_batches (id, tournament_id, status, sent_by)
            VALUES ($1, $2, 'pending', $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tournament_id)
        .bind(sent_by)
        .fetch_one(pool)
        .await?;

        Ok(batch)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<NotificationBatch, AppError> {
        let batch: NotificationBatch =
            sqlx::query_as("SELECT * FROM notification_batches WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Batch {} not found", id)))?;

        Ok(batch)
    }

    pub async fn find_by_tournament(
        pool: &PgPool,
        tournament_id: Uuid,
    ) -> Result<Option<NotificationBatch>, AppError> {
        let batch: Option<NotificationBatch> =
            sqlx::query_as("SELECT * FROM notification_batches WHERE tournament_id = $1")
                .bind(tournament_id)
                .fetch_optional(pool)
                .await?;

        Ok(batch)
    }

    /// List batches, optionally restricted to one tournament year.
    pub async fn list(
        pool: &PgPool,
        year: Option<i32>,
    ) -> Result<Vec<NotificationBatch>, AppError> {
        let batches: Vec<NotificationBatch> = match year {
            Some(year) => {
                sqlx::query_as(
                    r#"
                    SELECT b.*
                    FROM notification_batches b
                    JOIN tournaments t ON b.tournament_id = t.id
                    WHERE t.year = $1
                    ORDER BY b.created_at DESC
                    "#,
                )
                .bind(year)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM notification_batches ORDER BY created_at DESC")
                    .fetch_all(pool)
                    .await?
            }
        };

        Ok(batches)
    }

    /// Record the final recipient count after records are created, stamping
    /// the dispatch time.
    pub async fn finalize_created(
        pool: &PgPool,
        id: Uuid,
        total_recipients: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notification_batches SET total_recipients = $1, sent_at = NOW() WHERE id = $2",
        )
        .bind(total_recipients)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notification_batches SET status = 'failed', error_message = $1 WHERE id = $2",
        )
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Hard-delete a batch; child records cascade. Returns true when a row
    /// was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notification_batches WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Per-status record counts for a batch.
    pub async fn status_counts(pool: &PgPool, id: Uuid) -> Result<StatusCounts, AppError> {
        let counts: StatusCounts = sqlx::query_as(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'sent') AS sent,
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                   COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
            FROM notification_records
            WHERE batch_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(counts)
    }

    /// Per-category sent/failed counts for the batch `details` column.
    pub async fn category_details(pool: &PgPool, id: Uuid) -> Result<BatchDetails, AppError> {
        let rows: Vec<(RecipientType, i64, i64)> = sqlx::query_as(
            r#"
            SELECT recipient_type,
                   COUNT(*) FILTER (WHERE status = 'sent') AS sent,
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM notification_records
            WHERE batch_id = $1
            GROUP BY recipient_type
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let mut details = BatchDetails::default();
        for (recipient_type, sent, failed) in rows {
            let slot = match recipient_type {
                RecipientType::Club => &mut details.club,
                RecipientType::Referee => &mut details.referees,
                RecipientType::Institutional => &mut details.institutional,
            };
            *slot = CategoryCounts { sent, failed };
        }

        Ok(details)
    }

    /// Recompute and persist the batch's aggregate status and details from
    /// its current record states. Returns the new status.
    pub async fn refresh_status(pool: &PgPool, id: Uuid) -> Result<BatchStatus, AppError> {
        let counts = Self::status_counts(pool, id).await?;
        let status = aggregate_status(&counts);
        let details = Self::category_details(pool, id).await?;

        sqlx::query("UPDATE notification_batches SET status = $1, details = $2 WHERE id = $3")
            .bind(status)
            .bind(serde_json::to_value(&details).unwrap_or_default())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(status)
    }

    /// Delete sent batches whose dispatch time is older than `cutoff`.
    /// Child records cascade. Returns the number of batches deleted.
    pub async fn delete_sent_older_than(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM notification_batches WHERE status = 'sent' AND sent_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Aggregate notification statistics across all batches and records.
    pub async fn stats(pool: &PgPool) -> Result<NotificationStats, AppError> {
        let stats: NotificationStats = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM notification_batches) AS total_batches,
                (SELECT COUNT(*) FROM notification_batches WHERE status = 'sent') AS batches_sent,
                (SELECT COUNT(*) FROM notification_batches WHERE status = 'partial') AS batches_partial,
                (SELECT COUNT(*) FROM notification_batches WHERE status = 'failed') AS batches_failed,
                (SELECT COUNT(*) FROM notification_batches WHERE status = 'pending') AS batches_pending,
                (SELECT COUNT(*) FROM notification_records) AS total_records,
                (SELECT COUNT(*) FROM notification_records WHERE status = 'sent') AS records_sent,
                (SELECT COUNT(*) FROM notification_records WHERE status = 'failed') AS records_failed
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(stats)
    }
}

/// Record reads and writes. Status mutations are single-row updates guarded
/// by the current status, so duplicate worker invocations become no-ops.
pub struct RecordRepo;

impl RecordRepo {
    pub async fn create(pool: &PgPool, new: &NewRecord) -> Result<NotificationRecord, AppError> {
        let record: NotificationRecord = sqlx::query_as(
            r#"
            INSERT INTO notification_records
                (id, batch_id, recipient_type, recipient_name, recipient_email,
                 subject, body, status, priority, scheduled_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.batch_id)
        .bind(new.recipient_type)
        .bind(&new.recipient_name)
        .bind(&new.recipient_email)
        .bind(&new.subject)
        .bind(&new.body)
        .bind(new.priority)
        .bind(new.scheduled_at)
        .bind(new.expires_at)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<NotificationRecord>, AppError> {
        let record: Option<NotificationRecord> =
            sqlx::query_as("SELECT * FROM notification_records WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(record)
    }

    pub async fn list_by_batch(
        pool: &PgPool,
        batch_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let records: Vec<NotificationRecord> = sqlx::query_as(
            "SELECT * FROM notification_records WHERE batch_id = $1 ORDER BY created_at, recipient_email",
        )
        .bind(batch_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    pub async fn failed_by_batch(
        pool: &PgPool,
        batch_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let records: Vec<NotificationRecord> = sqlx::query_as(
            "SELECT * FROM notification_records WHERE batch_id = $1 AND status = 'failed'",
        )
        .bind(batch_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    /// pending → sent. No-op when the record is not pending.
    pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE notification_records
            SET status = 'sent', sent_at = NOW(), error_message = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record one failed attempt: bump `retry_count`, store the error.
    /// Returns the new retry count.
    pub async fn record_failure(
        pool: &PgPool,
        id: Uuid,
        error: &str,
    ) -> Result<i32, AppError> {
        let (retry_count,): (i32,) = sqlx::query_as(
            r#"
            UPDATE notification_records
            SET retry_count = retry_count + 1, error_message = $1
            WHERE id = $2
            RETURNING retry_count
            "#,
        )
        .bind(error)
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(retry_count)
    }

    /// pending → failed (terminal, retries exhausted).
    pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notification_records SET status = 'failed' WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// pending → cancelled (expired before delivery).
    pub async fn mark_cancelled(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notification_records SET status = 'cancelled' WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// failed → pending, for a resend. Grants a fresh delivery budget by
    /// zeroing `retry_count`. Returns true when the record was reset.
    pub async fn reset_pending(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_records
            SET status = 'pending', retry_count = 0, error_message = NULL
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: i64, pending: i64, sent: i64, failed: i64, cancelled: i64) -> StatusCounts {
        StatusCounts {
            total,
            pending,
            sent,
            failed,
            cancelled,
        }
    }

    #[test]
    fn test_aggregate_all_sent() {
        assert_eq!(
            aggregate_status(&counts(6, 0, 6, 0, 0)),
            BatchStatus::Sent
        );
    }

    #[test]
    fn test_aggregate_none_sent() {
        assert_eq!(
            aggregate_status(&counts(3, 0, 0, 3, 0)),
            BatchStatus::Failed
        );
        // All cancelled counts as none sent
        assert_eq!(
            aggregate_status(&counts(2, 0, 0, 0, 2)),
            BatchStatus::Failed
        );
    }

    #[test]
    fn test_aggregate_partial() {
        assert_eq!(
            aggregate_status(&counts(6, 0, 5, 1, 0)),
            BatchStatus::Partial
        );
        assert_eq!(
            aggregate_status(&counts(3, 0, 1, 0, 2)),
            BatchStatus::Partial
        );
    }

    #[test]
    fn test_aggregate_pending_while_in_flight() {
        assert_eq!(
            aggregate_status(&counts(6, 2, 4, 0, 0)),
            BatchStatus::Pending
        );
        assert_eq!(aggregate_status(&counts(0, 0, 0, 0, 0)), BatchStatus::Pending);
    }
}
