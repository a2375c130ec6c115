//! Delivery priority function.
//!
//! The lane is derived from the recipient category, with an urgency bump for
//! tournaments starting soon: the club contact must always react first, so it
//! starts High; referees Normal; institutional copies Low.

use chrono::NaiveDate;

use fairway_common::types::{Priority, RecipientType};

/// A tournament starting within this many days makes its sends urgent.
const URGENT_WINDOW_DAYS: i64 = 2;

/// Base lane for a recipient category.
pub fn base_priority(recipient_type: RecipientType) -> Priority {
    match recipient_type {
        RecipientType::Club => Priority::High,
        RecipientType::Referee => Priority::Normal,
        RecipientType::Institutional => Priority::Low,
    }
}

/// Whether a tournament starting on `start_date` is urgent as of `today`.
/// Past start dates are urgent too (late notifications jump the queue).
pub fn is_urgent(start_date: NaiveDate, today: NaiveDate) -> bool {
    (start_date - today).num_days() <= URGENT_WINDOW_DAYS
}

/// Lane for one record: category base, bumped one lane when urgent.
pub fn compute_priority(recipient_type: RecipientType, urgent: bool) -> Priority {
    let base = base_priority(recipient_type);
    if urgent { base.bumped() } else { base }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_base_lanes() {
        assert_eq!(base_priority(RecipientType::Club), Priority::High);
        assert_eq!(base_priority(RecipientType::Referee), Priority::Normal);
        assert_eq!(base_priority(RecipientType::Institutional), Priority::Low);
    }

    #[test]
    fn test_urgency_window() {
        let today = date(2026, 6, 1);
        assert!(is_urgent(date(2026, 6, 1), today));
        assert!(is_urgent(date(2026, 6, 3), today));
        assert!(!is_urgent(date(2026, 6, 4), today));
        // Already started — still urgent
        assert!(is_urgent(date(2026, 5, 30), today));
    }

    #[test]
    fn test_urgent_bump() {
        assert_eq!(compute_priority(RecipientType::Club, true), Priority::High);
        assert_eq!(
            compute_priority(RecipientType::Referee, true),
            Priority::High
        );
        assert_eq!(
            compute_priority(RecipientType::Institutional, true),
            Priority::Normal
        );
    }

    #[test]
    fn test_non_urgent_uses_base() {
        assert_eq!(
            compute_priority(RecipientType::Referee, false),
            Priority::Normal
        );
        assert_eq!(
            compute_priority(RecipientType::Institutional, false),
            Priority::Low
        );
    }
}
