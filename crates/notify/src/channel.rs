use async_trait::async_trait;
use secrecy::SecretString;
use tracing::info;

use storemind_core::domain::alert::{Alert, NotificationChannel};

use crate::render::render;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("channel is disabled")]
    Disabled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("delivery timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// One delivery provider. Implementations own their credentials and
/// formatting; the dispatcher owns routing and timeouts.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError>;
}

/// SMS provider stub. Holds the gateway credential so the real
/// integration slots in without changing call sites.
pub struct LoggingSmsSender {
    enabled: bool,
    _api_key: Option<SecretString>,
}

impl LoggingSmsSender {
    pub fn new(enabled: bool, api_key: Option<SecretString>) -> Self {
        Self { enabled, _api_key: api_key }
    }
}

#[async_trait]
impl ChannelSender for LoggingSmsSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sms
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        if !self.enabled {
            return Err(DeliveryError::Disabled);
        }
        let message = render(alert, NotificationChannel::Sms);
        info!(
            event_name = "notify.sms_sent",
            alert_id = %alert.id.0,
            body = %message.body,
            "sms notification sent"
        );
        Ok(())
    }
}

pub struct LoggingEmailSender {
    enabled: bool,
    _api_key: Option<SecretString>,
}

impl LoggingEmailSender {
    pub fn new(enabled: bool, api_key: Option<SecretString>) -> Self {
        Self { enabled, _api_key: api_key }
    }
}

#[async_trait]
impl ChannelSender for LoggingEmailSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        if !self.enabled {
            return Err(DeliveryError::Disabled);
        }
        let message = render(alert, NotificationChannel::Email);
        info!(
            event_name = "notify.email_sent",
            alert_id = %alert.id.0,
            subject = message.subject.as_deref().unwrap_or_default(),
            "email notification sent"
        );
        Ok(())
    }
}

/// In-app delivery is a no-op beyond logging: the alert row itself is
/// the in-app notification, surfaced by the alert list.
#[derive(Default)]
pub struct LoggingInAppSender;

#[async_trait]
impl ChannelSender for LoggingInAppSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::InApp
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        info!(
            event_name = "notify.in_app_sent",
            alert_id = %alert.id.0,
            "in-app notification recorded"
        );
        Ok(())
    }
}
