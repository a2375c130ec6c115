//! Batch dispatch — builds a notification batch for one tournament and hands
//! every record to the delivery queue.

use chrono::{NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fairway_common::error::AppError;
use fairway_common::queue::{DeliveryJob, JobQueue};
use fairway_common::types::{NotificationBatch, RecipientType, Tournament};

use crate::priority::{compute_priority, is_urgent};
use crate::recipients::{RecipientResolver, ResolvedRecipients, referee_lines};
use crate::repository::{BatchRepo, NewRecord, RecordRepo, TournamentRepo};
use crate::template::{
    MessageTemplate, TemplateValue, TemplateVars, render_message, require_template,
};

/// Options for one dispatch, as chosen by the operator.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub club_template: Option<String>,
    pub referee_template: Option<String>,
    pub institutional_template: Option<String>,
    pub send_to_club: bool,
    pub send_to_referees: bool,
    pub send_to_institutional: bool,
    pub include_attachments: bool,
    pub custom_message: Option<String>,
    pub sent_by: String,
}

/// What a dispatch produced, returned to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchSummary {
    pub batch_id: Uuid,
    pub tournament_id: Uuid,
    pub total_recipients: usize,
    pub club: usize,
    pub referees: usize,
    pub institutional: usize,
}

/// Templates resolved per enabled category, validated before any row is
/// written.
struct ResolvedTemplates {
    club: Option<&'static MessageTemplate>,
    referee: Option<&'static MessageTemplate>,
    institutional: Option<&'static MessageTemplate>,
}

pub struct DispatchService;

impl DispatchService {
    /// Create a batch and its records for a tournament, then enqueue one
    /// delivery job per record.
    ///
    /// Rejects with `Conflict` when the tournament already has a batch and
    /// with `Validation` when an enabled category lacks a valid template or
    /// no recipients resolve. If record creation fails mid-flight the batch
    /// is marked failed and the error is re-raised.
    pub async fn send(
        pool: &PgPool,
        queue: &dyn JobQueue,
        tournament_id: Uuid,
        year: i32,
        options: &SendOptions,
        institutional_emails: &[String],
    ) -> Result<DispatchSummary, AppError> {
        let tournament = TournamentRepo::get(pool, tournament_id, year).await?;

        if BatchRepo::find_by_tournament(pool, tournament_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Tournament {} already has a notification batch",
                tournament_id
            )));
        }

        let templates = Self::resolve_templates(options)?;
        let resolved =
            RecipientResolver::resolve(pool, &tournament, options, institutional_emails).await?;

        if resolved.recipients.is_empty() {
            return Err(AppError::Validation(format!(
                "No recipients resolved for tournament {}",
                tournament_id
            )));
        }

        let batch = BatchRepo::create(pool, tournament_id, &options.sent_by).await?;

        // Any failure between batch creation and the last enqueue marks the
        // batch failed; a batch left pending with unqueued records would
        // block the tournament behind the one-batch conflict check.
        let records = match Self::populate(pool, queue, &batch, &tournament, &resolved, &templates, options)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                if let Err(mark_err) =
                    BatchRepo::mark_failed(pool, batch.id, &e.to_string()).await
                {
                    tracing::error!(batch_id = %batch.id, error = %mark_err, "Failed to mark batch failed");
                }
                return Err(e);
            }
        };

        let club = resolved
            .recipients
            .iter()
            .filter(|r| r.recipient_type == RecipientType::Club)
            .count();
        let referees = resolved
            .recipients
            .iter()
            .filter(|r| r.recipient_type == RecipientType::Referee)
            .count();
        let institutional = resolved.recipients.len() - club - referees;

        tracing::info!(
            batch_id = %batch.id,
            tournament_id = %tournament_id,
            total = records.len(),
            club,
            referees,
            institutional,
            "Notification batch dispatched"
        );

        Ok(DispatchSummary {
            batch_id: batch.id,
            tournament_id,
            total_recipients: records.len(),
            club,
            referees,
            institutional,
        })
    }

    /// Validate template names for every enabled category up front.
    fn resolve_templates(options: &SendOptions) -> Result<ResolvedTemplates, AppError> {
        let resolve = |enabled: bool, name: &Option<String>, category: &str| {
            if !enabled {
                return Ok(None);
            }
            match name {
                Some(name) => require_template(name).map(Some),
                None => Err(AppError::Validation(format!(
                    "Missing template name for {} recipients",
                    category
                ))),
            }
        };

        Ok(ResolvedTemplates {
            club: resolve(options.send_to_club, &options.club_template, "club")?,
            referee: resolve(options.send_to_referees, &options.referee_template, "referee")?,
            institutional: resolve(
                options.send_to_institutional,
                &options.institutional_template,
                "institutional",
            )?,
        })
    }

    /// Create the batch's records, stamp the final count, and enqueue one
    /// first-attempt job per record.
    async fn populate(
        pool: &PgPool,
        queue: &dyn JobQueue,
        batch: &NotificationBatch,
        tournament: &Tournament,
        resolved: &ResolvedRecipients,
        templates: &ResolvedTemplates,
        options: &SendOptions,
    ) -> Result<Vec<(Uuid, fairway_common::types::Priority)>, AppError> {
        let records =
            Self::create_records(pool, batch, tournament, resolved, templates, options).await?;

        BatchRepo::finalize_created(pool, batch.id, records.len() as i32).await?;

        for (record_id, priority) in &records {
            queue
                .enqueue(
                    DeliveryJob {
                        record_id: *record_id,
                        attempt: 1,
                    },
                    *priority,
                )
                .await?;
        }

        Ok(records)
    }

    async fn create_records(
        pool: &PgPool,
        batch: &NotificationBatch,
        tournament: &Tournament,
        resolved: &ResolvedRecipients,
        templates: &ResolvedTemplates,
        options: &SendOptions,
    ) -> Result<Vec<(Uuid, fairway_common::types::Priority)>, AppError> {
        let urgent = is_urgent(tournament.start_date, Utc::now().date_naive());

        // Notifications are pointless once the tournament is over.
        let expires_at = tournament
            .end_date
            .succ_opt()
            .unwrap_or(tournament.end_date)
            .and_time(NaiveTime::MIN)
            .and_utc();

        let lines = referee_lines(&resolved.assignments);
        let mut created = Vec::with_capacity(resolved.recipients.len());

        for recipient in &resolved.recipients {
            let template = match recipient.recipient_type {
                RecipientType::Club => templates.club,
                RecipientType::Referee => templates.referee,
                RecipientType::Institutional => templates.institutional,
            }
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "No template resolved for {} recipient",
                    recipient.recipient_type
                ))
            })?;

            let mut vars: TemplateVars = TemplateVars::new();
            vars.insert(
                "tournament_name".into(),
                TemplateValue::Text(tournament.name.clone()),
            );
            vars.insert(
                "club_name".into(),
                TemplateValue::Text(resolved.club.name.clone()),
            );
            vars.insert(
                "start_date".into(),
                TemplateValue::Text(tournament.start_date.format("%d/%m/%Y").to_string()),
            );
            vars.insert(
                "end_date".into(),
                TemplateValue::Text(tournament.end_date.format("%d/%m/%Y").to_string()),
            );
            vars.insert(
                "year".into(),
                TemplateValue::Text(tournament.year.to_string()),
            );
            vars.insert(
                "custom_message".into(),
                TemplateValue::Text(options.custom_message.clone().unwrap_or_default()),
            );
            vars.insert("referees".into(), TemplateValue::List(lines.clone()));
            vars.insert(
                "recipient_name".into(),
                TemplateValue::Text(recipient.name.clone()),
            );
            if recipient.recipient_type == RecipientType::Referee {
                vars.insert(
                    "referee_name".into(),
                    TemplateValue::Text(recipient.name.clone()),
                );
                vars.insert(
                    "role".into(),
                    TemplateValue::Text(recipient.role.clone().unwrap_or_default()),
                );
            }

            let message = render_message(template, &vars);
            let priority = compute_priority(recipient.recipient_type, urgent);

            let record = RecordRepo::create(
                pool,
                &NewRecord {
                    batch_id: batch.id,
                    recipient_type: recipient.recipient_type,
                    recipient_name: recipient.name.clone(),
                    recipient_email: recipient.email.clone(),
                    subject: message.subject,
                    body: message.body,
                    priority,
                    scheduled_at: None,
                    expires_at: Some(expires_at),
                },
            )
            .await?;

            created.push((record.id, priority));
        }

        Ok(created)
    }
}
