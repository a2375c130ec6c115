use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (delivery queue backend)
    pub redis_url: String,

    /// API key operators must present on the HTTP surface
    pub operator_api_key: String,

    /// Resend API key for email delivery (required by the worker)
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Institutional addresses notified for every tournament (federation,
    /// regional committee). Empty = no institutional recipients.
    pub institutional_emails: Vec<String>,

    /// Operator addresses alerted when a record exhausts its retries.
    /// Empty = alerts disabled.
    pub alert_emails: Vec<String>,

    /// Days to keep sent batches before the cleanup task deletes them (default: 90)
    pub retention_days: u32,

    /// Minimum minutes since the last attempt before a batch may be resent (default: 30)
    pub resend_cooldown_minutes: i64,

    /// Seconds the bulk sender sleeps between tournaments (default: 2)
    pub bulk_send_delay_secs: u64,

    /// Number of concurrent delivery worker tasks (default: 4)
    pub worker_count: usize,

    /// Hours between cleanup runs (default: 24)
    pub cleanup_interval_hours: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            operator_api_key: std::env::var("OPERATOR_API_KEY").map_err(|_| {
                anyhow::anyhow!("OPERATOR_API_KEY environment variable is required")
            })?,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            institutional_emails: parse_email_list(
                &std::env::var("INSTITUTIONAL_EMAILS").unwrap_or_default(),
            ),
            alert_emails: parse_email_list(&std::env::var("ALERT_EMAILS").unwrap_or_default()),
            retention_days: std::env::var("RETENTION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETENTION_DAYS must be a valid u32"))?,
            resend_cooldown_minutes: std::env::var("RESEND_COOLDOWN_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RESEND_COOLDOWN_MINUTES must be a valid i64"))?,
            bulk_send_delay_secs: std::env::var("BULK_SEND_DELAY_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BULK_SEND_DELAY_SECS must be a valid u64"))?,
            worker_count: std::env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_COUNT must be a valid usize"))?,
            cleanup_interval_hours: std::env::var("CLEANUP_INTERVAL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CLEANUP_INTERVAL_HOURS must be a valid u64"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}

/// Split a comma-separated address list, dropping empty entries.
fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_list() {
        assert_eq!(
            parse_email_list("a@b.it, c@d.it ,,e@f.it"),
            vec!["a@b.it", "c@d.it", "e@f.it"]
        );
        assert!(parse_email_list("").is_empty());
        assert!(parse_email_list(" , ").is_empty());
    }
}
