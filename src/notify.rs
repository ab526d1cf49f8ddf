//! Best-effort chat notification of run summaries.

use crate::error::BackupError;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Serialize, Debug)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts messages to an incoming chat webhook, if one is configured.
#[derive(Debug, Clone)]
pub struct Notifier {
    target: Option<(String, reqwest::Client)>,
}

impl Notifier {
    /// A notifier for `webhook`. A blank URL, or an HTTP client that cannot
    /// be built, leaves the notifier disabled.
    pub fn new(webhook: Option<String>) -> Self {
        let Some(url) = webhook.filter(|url| !url.trim().is_empty()) else {
            return Self::disabled();
        };

        match reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
        {
            Ok(client) => Self {
                target: Some((url, client)),
            },
            Err(e) => {
                warn!("Notifications disabled, cannot build HTTP client: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Sends `subject` and `body`. Never fails: without a webhook this is a
    /// no-op and delivery errors are only logged.
    pub async fn notify(&self, subject: &str, body: &str) {
        let Some((url, client)) = self.target.as_ref() else {
            debug!("No notification webhook configured, skipping {:?}", subject);
            return;
        };

        match post(client, url, subject, body).await {
            Ok(()) => info!("📣 Sent notification {:?}", subject),
            Err(e) => warn!("Failed to send notification {:?}: {}", subject, e),
        }
    }
}

/// Renders the JSON payload posted to the webhook.
fn payload(subject: &str, body: &str) -> Result<Vec<u8>, BackupError> {
    let text = format!("*{}*\n```\n{}\n```", subject, body);
    Ok(serde_json::to_vec(&WebhookMessage { text: &text })?)
}

async fn post(
    client: &reqwest::Client,
    url: &str,
    subject: &str,
    body: &str,
) -> Result<(), BackupError> {
    client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(payload(subject, body)?)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
