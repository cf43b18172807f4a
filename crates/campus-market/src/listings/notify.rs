use std::fs::OpenOptions;
use std::io::Write;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::MailConfig;

/// One expiry warning to be delivered to a listing owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub recipient: String,
    pub listing_title: String,
    pub days_left: u32,
}

/// Outbound seam for expiry-warning delivery. Implementations are
/// best-effort: the sweep observes the result for logging only and never
/// branches on it.
#[async_trait]
pub trait ExpiryNotifier: Send + Sync {
    async fn send_expiry_warning(&self, notice: ExpiryNotice) -> Result<(), NotifyError>;
}

/// Notification delivery error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("unable to record undelivered notice: {0}")]
    Spool(String),
}

#[derive(Debug, Serialize)]
struct SpooledNotice<'a> {
    recorded_at: String,
    reason: &'a str,
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Mail delivery via a transactional-mail HTTP API.
///
/// When the transport is unconfigured, or a send fails, the notice is
/// appended to a local JSONL spool file so the attempt stays visible to
/// operators. Spooling counts as handled; only a spool-write failure
/// surfaces as an error.
#[derive(Debug, Clone)]
pub struct MailGateway {
    client: reqwest::Client,
    config: MailConfig,
}

impl MailGateway {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn render(notice: &ExpiryNotice) -> (String, String) {
        let when = match notice.days_left {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            days => format!("in {days} days"),
        };
        let subject = format!("Your listing \"{}\" expires {when}", notice.listing_title);
        let body = format!(
            "Your listing \"{}\" will be removed from the marketplace {when}.\n\n\
             Mark it as sold if it found a buyer, or repost it to keep it visible.",
            notice.listing_title
        );
        (subject, body)
    }

    fn spool(&self, notice: &ExpiryNotice, reason: &str) -> Result<(), NotifyError> {
        let (subject, body) = Self::render(notice);
        let record = SpooledNotice {
            recorded_at: Utc::now().to_rfc3339(),
            reason,
            recipient: &notice.recipient,
            subject: &subject,
            body: &body,
        };

        let line = serde_json::to_string(&record)
            .map_err(|err| NotifyError::Spool(err.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.spool_path)
            .map_err(|err| NotifyError::Spool(err.to_string()))?;
        writeln!(file, "{line}").map_err(|err| NotifyError::Spool(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ExpiryNotifier for MailGateway {
    async fn send_expiry_warning(&self, notice: ExpiryNotice) -> Result<(), NotifyError> {
        let Some(api) = &self.config.api else {
            info!(
                recipient = %notice.recipient,
                "mail transport not configured; recording expiry warning locally"
            );
            return self.spool(&notice, "transport not configured");
        };

        let (subject, body) = Self::render(&notice);
        let payload = json!({
            "from": api.from,
            "to": notice.recipient,
            "subject": subject,
            "text": body,
        });

        let result = self
            .client
            .post(&api.url)
            .bearer_auth(&api.token)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(recipient = %notice.recipient, %err, "expiry warning send failed; spooling");
                self.spool(&notice, &err.to_string())
            }
        }
    }
}
