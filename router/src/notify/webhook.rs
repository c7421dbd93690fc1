//! Incoming-webhook chat sink (Slack/Discord compatible)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::errors::RouterError;
use crate::notify::{Notification, NotificationSink, Severity};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    /// Slack reads `text`
    text: &'a str,
    /// Discord reads `content`
    content: &'a str,
}

/// Posts notifications to a chat webhook URL
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self, RouterError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

/// Message text as posted to the channel
pub fn format_message(notification: &Notification) -> String {
    let icon = match notification.severity {
        Severity::Info => "ℹ️",
        Severity::Success => "✅",
        Severity::Warning => "🔄",
        Severity::Error => "❌",
    };
    match &notification.commit {
        Some(commit) => format!(
            "{} {} ({} on {}: {})",
            icon,
            notification.message,
            commit.short_hash(),
            commit.branch,
            commit.message
        ),
        None => format!("{} {}", icon, notification.message),
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<(), RouterError> {
        let text = format_message(notification);
        debug!("POST notification to chat webhook");
        let response = self
            .client
            .post(&self.url)
            .json(&ChatMessage {
                text: &text,
                content: &text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RouterError::NotifyError(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}
