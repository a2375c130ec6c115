//! Operator alerts for permanently failed deliveries.
//!
//! Best-effort: an alert that cannot be sent is logged and swallowed, never
//! re-raised into the delivery path.

use std::sync::Arc;

use fairway_common::types::{BatchStatus, NotificationRecord};

use crate::mailer::{Mailer, OutboundEmail};

pub struct AlertNotifier {
    mailer: Arc<dyn Mailer>,
    recipients: Vec<String>,
}

impl AlertNotifier {
    /// `recipients` comes from `AppConfig::alert_emails`; empty disables
    /// alerting entirely.
    pub fn new(mailer: Arc<dyn Mailer>, recipients: Vec<String>) -> Self {
        Self { mailer, recipients }
    }

    /// Notify operators that a record exhausted its retries.
    pub async fn record_exhausted(
        &self,
        record: &NotificationRecord,
        attempts: i32,
        error: &str,
        batch_status: BatchStatus,
    ) {
        if self.recipients.is_empty() {
            return;
        }

        let subject = format!("Notification delivery failed (batch {})", record.batch_id);
        let body = format!(
            "Delivery to {} ({}) failed permanently after {} attempts.\n\n\
             Record: {}\nBatch: {} (now {})\nLast error: {}\n",
            record.recipient_email,
            record.recipient_type,
            attempts,
            record.id,
            record.batch_id,
            batch_status,
            error,
        );

        for recipient in &self.recipients {
            let email = OutboundEmail {
                to: recipient.clone(),
                subject: subject.clone(),
                body: body.clone(),
                attachments: Vec::new(),
            };
            if let Err(e) = self.mailer.send(&email).await {
                tracing::warn!(
                    alert_recipient = %recipient,
                    record_id = %record.id,
                    error = %e,
                    "Operator alert failed"
                );
            }
        }
    }
}
