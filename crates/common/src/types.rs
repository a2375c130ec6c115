use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Maximum delivery attempts per notification record.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 3;

/// Fixed backoff schedule between delivery attempts, in seconds.
/// Indexed by the number of attempts already made (1-based attempt N waits
/// `BACKOFF_SECONDS[N - 1]` before attempt N + 1).
pub const BACKOFF_SECONDS: [u64; 3] = [30, 60, 120];

/// Category of a notification recipient. Determines template and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    Club,
    Referee,
    Institutional,
}

impl std::fmt::Display for RecipientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientType::Club => write!(f, "club"),
            RecipientType::Referee => write!(f, "referee"),
            RecipientType::Institutional => write!(f, "institutional"),
        }
    }
}

/// Delivery status of a single notification record.
///
/// `Sent` and `Cancelled` are terminal; `Failed` may go back to `Pending`
/// only through a resend, which grants a fresh delivery budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Pending => write!(f, "pending"),
            RecordStatus::Sent => write!(f, "sent"),
            RecordStatus::Failed => write!(f, "failed"),
            RecordStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Aggregate status of a notification batch over its child records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Sent,
    Failed,
    Partial,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Sent => write!(f, "sent"),
            BatchStatus::Failed => write!(f, "failed"),
            BatchStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Delivery priority. Stored as an integer column; maps to a queue lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

impl Priority {
    /// Name of the Redis queue lane this priority maps to.
    pub fn queue_lane(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Raise the priority by one lane (High stays High).
    pub fn bumped(self) -> Self {
        match self {
            Priority::High | Priority::Normal => Priority::High,
            Priority::Low => Priority::Normal,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.queue_lane())
    }
}

/// Referee qualification level.
///
/// Levels arrive as free-form text from legacy data (including Italian
/// spellings); parsing goes through a closed alias table and unknown inputs
/// are rejected rather than passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefereeLevel {
    National,
    Regional,
    Zonal,
    Observer,
}

/// Accepted input spellings for each referee level.
const REFEREE_LEVEL_ALIASES: &[(&str, RefereeLevel)] = &[
    ("national", RefereeLevel::National),
    ("nazionale", RefereeLevel::National),
    ("arbitro nazionale", RefereeLevel::National),
    ("naz", RefereeLevel::National),
    ("regional", RefereeLevel::Regional),
    ("regionale", RefereeLevel::Regional),
    ("arbitro regionale", RefereeLevel::Regional),
    ("reg", RefereeLevel::Regional),
    ("zonal", RefereeLevel::Zonal),
    ("zonale", RefereeLevel::Zonal),
    ("arbitro di zona", RefereeLevel::Zonal),
    ("zona", RefereeLevel::Zonal),
    ("observer", RefereeLevel::Observer),
    ("osservatore", RefereeLevel::Observer),
    ("oss", RefereeLevel::Observer),
];

impl std::str::FromStr for RefereeLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        REFEREE_LEVEL_ALIASES
            .iter()
            .find(|(alias, _)| *alias == needle)
            .map(|(_, level)| *level)
            .ok_or_else(|| AppError::Validation(format!("Unknown referee level '{}'", s)))
    }
}

impl std::fmt::Display for RefereeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefereeLevel::National => write!(f, "national"),
            RefereeLevel::Regional => write!(f, "regional"),
            RefereeLevel::Zonal => write!(f, "zonal"),
            RefereeLevel::Observer => write!(f, "observer"),
        }
    }
}

/// A zone (territorial grouping of clubs and referees).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
}

/// A golf club hosting tournaments. `email` is the club's notification contact.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub zone_id: Uuid,
}

/// A referee. `level` is stored as raw text and normalized to `RefereeLevel`
/// where the distinction matters.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Referee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub level: String,
    pub zone_id: Uuid,
}

/// A tournament. `year` is an explicit column; every query takes it as a
/// parameter rather than relying on ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub club_id: Uuid,
    pub zone_id: Uuid,
}

/// A confirmed referee assignment joined with referee contact data,
/// as resolved for recipient lists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConfirmedAssignment {
    pub referee_id: Uuid,
    pub referee_name: String,
    pub referee_email: String,
    pub role: String,
    pub level: String,
}

/// One outbound message to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub recipient_type: RecipientType,
    pub recipient_name: String,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub status: RecordStatus,
    pub priority: Priority,
    pub retry_count: i32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// All recipient sends for one tournament notification event.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationBatch {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub status: BatchStatus,
    pub total_recipients: i32,
    pub details: serde_json::Value,
    pub sent_by: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sent/failed counts for one recipient category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub sent: i64,
    pub failed: i64,
}

/// Typed representation of a batch's `details` JSONB column:
/// per-category sent/failed counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDetails {
    pub club: CategoryCounts,
    pub referees: CategoryCounts,
    pub institutional: CategoryCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_referee_level_accepts_aliases() {
        assert_eq!(
            RefereeLevel::from_str("Nazionale").unwrap(),
            RefereeLevel::National
        );
        assert_eq!(
            RefereeLevel::from_str("  arbitro regionale ").unwrap(),
            RefereeLevel::Regional
        );
        assert_eq!(RefereeLevel::from_str("zona").unwrap(), RefereeLevel::Zonal);
        assert_eq!(
            RefereeLevel::from_str("OSSERVATORE").unwrap(),
            RefereeLevel::Observer
        );
    }

    #[test]
    fn test_referee_level_rejects_unknown() {
        assert!(RefereeLevel::from_str("grandmaster").is_err());
        assert!(RefereeLevel::from_str("").is_err());
    }

    #[test]
    fn test_priority_queue_lanes() {
        assert_eq!(Priority::High.queue_lane(), "high");
        assert_eq!(Priority::Normal.queue_lane(), "normal");
        assert_eq!(Priority::Low.queue_lane(), "low");
    }

    #[test]
    fn test_priority_bump_caps_at_high() {
        assert_eq!(Priority::Low.bumped(), Priority::Normal);
        assert_eq!(Priority::Normal.bumped(), Priority::High);
        assert_eq!(Priority::High.bumped(), Priority::High);
    }

    #[test]
    fn test_batch_details_round_trip() {
        let details = BatchDetails {
            club: CategoryCounts { sent: 1, failed: 0 },
            referees: CategoryCounts { sent: 3, failed: 1 },
            institutional: CategoryCounts::default(),
        };
        let json = serde_json::to_value(&details).unwrap();
        let back: BatchDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, details);
    }
}
