//! Recipient resolution.
//!
//! Turns a tournament's related data into the flat recipient list a batch is
//! built from: the host club's contact, every confirmed referee assignment,
//! and the configured institutional addresses.

use std::str::FromStr;

use sqlx::PgPool;

use fairway_common::error::AppError;
use fairway_common::types::{Club, ConfirmedAssignment, RecipientType, RefereeLevel, Tournament};

use crate::dispatch::SendOptions;
use crate::repository::TournamentRepo;

/// One resolved recipient, before rendering.
#[derive(Debug, Clone)]
pub struct ResolvedRecipient {
    pub recipient_type: RecipientType,
    pub name: String,
    pub email: String,
    /// Assignment role, for referee recipients.
    pub role: Option<String>,
}

/// Everything recipient resolution produced for one dispatch.
#[derive(Debug, Clone)]
pub struct ResolvedRecipients {
    pub club: Club,
    pub assignments: Vec<ConfirmedAssignment>,
    pub recipients: Vec<ResolvedRecipient>,
}

pub struct RecipientResolver;

impl RecipientResolver {
    /// Resolve the recipient list for a tournament according to the send
    /// options. Referee levels that fail to normalize are logged and the
    /// referee is still notified; the level only matters for reporting.
    pub async fn resolve(
        pool: &PgPool,
        tournament: &Tournament,
        options: &SendOptions,
        institutional_emails: &[String],
    ) -> Result<ResolvedRecipients, AppError> {
        let club = TournamentRepo::get_club(pool, tournament.club_id).await?;
        let assignments = TournamentRepo::confirmed_assignments(pool, tournament.id).await?;

        let mut recipients = Vec::new();

        if options.send_to_club {
            recipients.push(ResolvedRecipient {
                recipient_type: RecipientType::Club,
                name: club.name.clone(),
                email: club.email.clone(),
                role: None,
            });
        }

        if options.send_to_referees {
            for assignment in &assignments {
                if let Err(e) = RefereeLevel::from_str(&assignment.level) {
                    tracing::warn!(
                        referee = %assignment.referee_name,
                        level = %assignment.level,
                        error = %e,
                        "Referee level did not normalize"
                    );
                }
                recipients.push(ResolvedRecipient {
                    recipient_type: RecipientType::Referee,
                    name: assignment.referee_name.clone(),
                    email: assignment.referee_email.clone(),
                    role: Some(assignment.role.clone()),
                });
            }
        }

        if options.send_to_institutional {
            for email in institutional_emails {
                recipients.push(ResolvedRecipient {
                    recipient_type: RecipientType::Institutional,
                    name: email.clone(),
                    email: email.clone(),
                    role: None,
                });
            }
        }

        Ok(ResolvedRecipients {
            club,
            assignments,
            recipients,
        })
    }
}

/// "Name - Role" line for each confirmed assignment, the flattened form used
/// by list-valued template placeholders.
pub fn referee_lines(assignments: &[ConfirmedAssignment]) -> Vec<String> {
    assignments
        .iter()
        .map(|a| format!("{} - {}", a.referee_name, a.role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_referee_lines_format() {
        let assignments = vec![
            ConfirmedAssignment {
                referee_id: Uuid::new_v4(),
                referee_name: "A".into(),
                referee_email: "a@x.it".into(),
                role: "Arbitro".into(),
                level: "nazionale".into(),
            },
            ConfirmedAssignment {
                referee_id: Uuid::new_v4(),
                referee_name: "B".into(),
                referee_email: "b@x.it".into(),
                role: "Osservatore".into(),
                level: "osservatore".into(),
            },
        ];
        assert_eq!(
            referee_lines(&assignments),
            vec!["A - Arbitro", "B - Osservatore"]
        );
    }
}
