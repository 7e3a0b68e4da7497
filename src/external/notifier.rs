use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::NotifierConfig;
use crate::error::{AppError, AppResult};

/// Out-of-band message to an account holder (reset link, OTP code).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Machine-readable secret carried by the message, if any.
    pub secret: Option<String>,
}

/// Delivery channel for notifications.
#[derive(Clone)]
pub enum Notifier {
    /// Writes the message to the application log.
    Log,
    /// Keeps messages in memory; demos and tests read them back.
    Outbox(Arc<Mutex<Vec<Notification>>>),
    /// POSTs the message as JSON to an email/SMS gateway.
    Webhook(WebhookNotifier),
}

impl Notifier {
    pub fn from_config(config: &NotifierConfig) -> Self {
        match &config.webhook_url {
            Some(url) => Notifier::Webhook(WebhookNotifier::new(url.clone())),
            None => Notifier::Log,
        }
    }

    pub fn outbox() -> Self {
        Notifier::Outbox(Arc::new(Mutex::new(Vec::new())))
    }

    pub async fn send(&self, notification: Notification) -> AppResult<()> {
        match self {
            Notifier::Log => {
                log::info!(
                    "Notification to {}: {} - {}",
                    notification.to,
                    notification.subject,
                    notification.body
                );
                Ok(())
            }
            Notifier::Outbox(sent) => {
                sent.lock().push(notification);
                Ok(())
            }
            Notifier::Webhook(webhook) => webhook.send(&notification).await,
        }
    }

    /// Most recent outbox message for `to`. Always `None` for other channels.
    pub fn last_sent_to(&self, to: &str) -> Option<Notification> {
        match self {
            Notifier::Outbox(sent) => sent.lock().iter().rev().find(|n| n.to == to).cloned(),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub async fn send(&self, notification: &Notification) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                log::error!("Notification webhook unreachable: {e}");
                AppError::ExternalApiError(format!("Notification service unreachable: {e}"))
            })?;

        if response.status().is_success() {
            log::info!("Notification delivered to {}", notification.to);
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!(
                "Notification to {} failed: {status}, Error: {error_text}",
                notification.to
            );
            Err(AppError::ExternalApiError(format!(
                "Notification delivery failed: {status}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(to: &str, body: &str) -> Notification {
        Notification {
            to: to.to_string(),
            subject: "subject".to_string(),
            body: body.to_string(),
            secret: None,
        }
    }

    #[tokio::test]
    async fn test_outbox_returns_latest_message() {
        let notifier = Notifier::outbox();
        notifier.send(note("a@x.com", "first")).await.unwrap();
        notifier.send(note("b@x.com", "other")).await.unwrap();
        notifier.send(note("a@x.com", "second")).await.unwrap();

        assert_eq!(notifier.last_sent_to("a@x.com").unwrap().body, "second");
        assert!(notifier.last_sent_to("c@x.com").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_external_error() {
        let notifier = Notifier::Webhook(WebhookNotifier::new("http://127.0.0.1:9/notify".into()));
        let err = notifier.send(note("a@x.com", "hi")).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApiError(_)));
    }

    #[test]
    fn test_from_config_defaults_to_log() {
        let notifier = Notifier::from_config(&NotifierConfig::default());
        assert!(matches!(notifier, Notifier::Log));
    }
}
