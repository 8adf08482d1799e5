use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Serialize;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    HoldCreated,
    AppointmentScheduled,
    AppointmentConfirmed,
}

/// Typed template variables for one booking event. Sinks render their own
/// message from these fields; no loose string maps cross this boundary.
#[derive(Debug, Clone, Serialize)]
pub struct BookingNotification {
    pub event: BookingEventKind,
    pub professional_id: String,
    pub reservation_id: Option<String>,
    pub appointment_id: Option<String>,
    pub confirmation_code: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub service_name: String,
    pub start_time: NaiveDateTime,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, notification: &BookingNotification) -> AppResult<()>;
}

/// POSTs each event as JSON to a configured endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &BookingNotification) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Notification endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Fire-and-forget dispatch of booking events. Failures are logged for
/// follow-up, never retried, and never reach the booking flow.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationService {
    pub fn from_config(config: &NotificationConfig) -> AppResult<Self> {
        let notifier = match &config.webhook_url {
            Some(url) => Some(Arc::new(WebhookNotifier::new(url.clone())?) as Arc<dyn Notifier>),
            None => None,
        };
        Ok(Self { notifier })
    }

    pub fn disabled() -> Self {
        Self { notifier: None }
    }

    pub fn dispatch(&self, notification: BookingNotification) {
        let Some(notifier) = self.notifier.clone() else {
            tracing::debug!(
                "No notification sink configured, dropping {:?} event",
                notification.event
            );
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                tracing::warn!(
                    "Failed to deliver {:?} notification for professional {}: {}",
                    notification.event,
                    notification.professional_id,
                    e
                );
            }
        });
    }
}
