// Captain notification when a draft cycle opens.

use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// One captain to notify.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub team_name: String,
    pub captain_name: String,
    pub email: String,
}

/// Payload posted to the webhook when a draft cycle starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftAnnouncement {
    pub league_name: String,
    pub season_id: i64,
    pub draft_id: i64,
    pub cycle_number: u32,
    pub draft_link: String,
    pub recipients: Vec<Recipient>,
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Posts announcements as JSON to a configured URL. Delivery (mail, chat) is
/// the receiver's business.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            token,
        }
    }

    pub async fn send(&self, announcement: &DraftAnnouncement) -> anyhow::Result<()> {
        let mut request = self
            .http
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(announcement);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .with_context(|| format!("failed to reach notification webhook {}", self.url))?
            .error_for_status()
            .context("notification webhook rejected the announcement")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub enum Notifier {
    Webhook(WebhookNotifier),
    /// No webhook configured; announcements are dropped.
    Disabled,
}

impl Notifier {
    /// `Webhook` if a URL is present in credentials, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.notify_webhook_url {
            Some(url) if !url.is_empty() => Notifier::Webhook(WebhookNotifier::new(
                url.clone(),
                config.credentials.notify_webhook_token.clone(),
            )),
            _ => Notifier::Disabled,
        }
    }

    pub async fn announce_draft(&self, announcement: &DraftAnnouncement) -> anyhow::Result<()> {
        match self {
            Notifier::Webhook(hook) => hook.send(announcement).await,
            Notifier::Disabled => {
                debug!(
                    "notifications disabled; not announcing draft {} to {} captains",
                    announcement.draft_id,
                    announcement.recipients.len()
                );
                Ok(())
            }
        }
    }
}
