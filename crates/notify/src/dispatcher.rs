use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use storemind_core::alerts::{ChannelDelivery, DeliveryStatus, NotificationDispatcher};
use storemind_core::config::NotifyConfig;
use storemind_core::domain::alert::{Alert, NotificationChannel};

use crate::channel::{
    ChannelSender, DeliveryError, LoggingEmailSender, LoggingInAppSender, LoggingSmsSender,
};

/// Routes each requested channel to its registered sender. Channels
/// deliver concurrently; each gets the configured timeout, and one
/// channel's failure never blocks the others.
pub struct RoutedDispatcher {
    senders: HashMap<NotificationChannel, Arc<dyn ChannelSender>>,
    channel_timeout: Duration,
}

impl RoutedDispatcher {
    pub fn new(channel_timeout_secs: u64) -> Self {
        Self {
            senders: HashMap::new(),
            channel_timeout: Duration::from_secs(channel_timeout_secs.max(1)),
        }
    }

    pub fn register(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(sender.channel(), sender);
        self
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.channel_timeout_secs)
            .register(Arc::new(LoggingSmsSender::new(
                config.sms_enabled,
                config.sms_api_key.clone(),
            )))
            .register(Arc::new(LoggingEmailSender::new(
                config.email_enabled,
                config.email_api_key.clone(),
            )))
            .register(Arc::new(LoggingInAppSender))
    }
}

#[async_trait]
impl NotificationDispatcher for RoutedDispatcher {
    async fn send(
        &self,
        alert: &Alert,
        channels: &[NotificationChannel],
    ) -> Vec<ChannelDelivery> {
        let mut handles = Vec::with_capacity(channels.len());
        for &channel in channels {
            let handle = self.senders.get(&channel).map(|sender| {
                let sender = sender.clone();
                let alert = alert.clone();
                let timeout = self.channel_timeout;
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, sender.send(&alert)).await {
                        Ok(result) => result,
                        Err(_elapsed) => Err(DeliveryError::Timeout {
                            timeout_secs: timeout.as_secs(),
                        }),
                    }
                })
            });
            handles.push((channel, handle));
        }

        let mut deliveries = Vec::with_capacity(channels.len());
        for (channel, handle) in handles {
            let status = match handle {
                None => DeliveryStatus::Failed { detail: "no sender registered".to_string() },
                Some(handle) => match handle.await {
                    Ok(Ok(())) => DeliveryStatus::Delivered,
                    Ok(Err(error)) => DeliveryStatus::Failed { detail: error.to_string() },
                    Err(join_error) => {
                        DeliveryStatus::Failed { detail: format!("sender panicked: {join_error}") }
                    }
                },
            };
            if let DeliveryStatus::Failed { detail } = &status {
                warn!(
                    event_name = "notify.channel_failed",
                    alert_id = %alert.id.0,
                    channel = channel.as_str(),
                    detail = %detail,
                    "channel delivery failed"
                );
            }
            deliveries.push(ChannelDelivery { channel, status });
        }
        deliveries
    }
}
