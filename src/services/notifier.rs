//! Delivery of booking domain events to outside consumers.
//!
//! Delivery is fire-and-forget: a notifier never fails the transition that
//! produced the event, it only logs what it could not deliver.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    config::NotificationsConfig,
    error::{AppError, AppResult},
    scheduling::DomainEvent,
};

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &DomainEvent);
}

/// Writes events to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &DomainEvent) {
        tracing::info!(
            "Booking event {:?} for booking {} (staff {})",
            event.kind,
            event.booking_id,
            event.staff_id
        );
    }
}

/// POSTs each event as JSON to a webhook URL
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build webhook client: {}", e)))?;
        Ok(Self { client, url })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: &DomainEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime to deliver event for booking {}", event.booking_id);
            return;
        };
        let client = self.client.clone();
        let url = self.url.clone();
        let event = event.clone();
        runtime.spawn(async move {
            let result = client.post(&url).json(&event).send().await;
            match result.and_then(|r| r.error_for_status()) {
                Ok(_) => tracing::debug!("Delivered {:?} for booking {}", event.kind, event.booking_id),
                Err(e) => tracing::warn!(
                    "Webhook delivery of {:?} for booking {} failed: {}",
                    event.kind,
                    event.booking_id,
                    e
                ),
            }
        });
    }
}

/// Hands events to an in-process consumer
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &DomainEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::warn!("Event consumer is gone, dropped event for booking {}", event.booking_id);
        }
    }
}

/// Webhook notifier when a URL is configured, log-only otherwise
pub fn notifier_from_config(config: &NotificationsConfig) -> AppResult<Arc<dyn Notifier>> {
    match &config.webhook_url {
        Some(url) if !url.is_empty() => {
            tracing::info!("Booking events are posted to {}", url);
            Ok(Arc::new(WebhookNotifier::new(
                url.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        _ => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::EventKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(kind: EventKind) -> DomainEvent {
        DomainEvent {
            kind,
            booking_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(&event(EventKind::Created));
        notifier.notify(&event(EventKind::Confirmed));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Created);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Confirmed);
    }

    #[test]
    fn test_channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(&event(EventKind::Cancelled));
    }

    #[test]
    fn test_config_without_url_logs_only() {
        let config = NotificationsConfig::default();
        assert!(notifier_from_config(&config).is_ok());
    }
}
