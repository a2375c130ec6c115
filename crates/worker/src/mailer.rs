//! Mail transport.
//!
//! The transport is a black box to the rest of the system: it takes an
//! outbound email and either succeeds or fails with a transport error.
//! Production delivery goes through the Resend HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use fairway_common::error::AppError;

/// Per-send HTTP timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// A file attached to an outbound email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// One email ready for the transport.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Transport seam. Exactly one transport call per delivery attempt.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), AppError>;
}

/// Resend HTTP API transport.
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), AppError> {
        let mut payload = json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "text": email.body,
        });

        if !email.attachments.is_empty() {
            let attachments: Vec<serde_json::Value> = email
                .attachments
                .iter()
                .map(|a| {
                    json!({
                        "filename": a.filename,
                        "content": BASE64.encode(&a.content),
                    })
                })
                .collect();
            payload["attachments"] = json!(attachments);
        }

        let response = self
            .http
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("Resend request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!(
                "Resend returned {}: {}",
                status, detail
            )));
        }

        Ok(())
    }
}
