//! Alert lifecycle: creation, listing, dismissal, and notification
//! fanout.
//!
//! An alert is considered created once it is persisted; notification
//! delivery is best-effort and can never roll a creation back. The
//! only lifecycle transition is `Active -> Dismissed`, guarded per
//! alert so concurrent dismissals cannot both succeed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::alert::{
    Alert, AlertFilter, AlertId, AlertPriority, AlertStatus, NotificationChannel,
};
use crate::errors::AlertError;
use crate::stores::AlertStore;
use crate::sync::KeyedMutex;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed { detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDelivery {
    pub channel: NotificationChannel,
    pub status: DeliveryStatus,
}

/// Fans an alert out to the requested channels and reports per-channel
/// delivery status. The lifecycle manager logs the statuses; it never
/// awaits them for correctness.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, alert: &Alert, channels: &[NotificationChannel])
        -> Vec<ChannelDelivery>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlert {
    pub title: String,
    pub description: String,
    pub priority: AlertPriority,
    pub source: String,
    #[serde(default)]
    pub action_items: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismissReceipt {
    pub alert_id: AlertId,
    pub dismissed_at: DateTime<Utc>,
    pub resolution_notes: String,
}

pub struct AlertLifecycleManager {
    store: Arc<dyn AlertStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    locks: KeyedMutex,
}

impl AlertLifecycleManager {
    pub fn new(store: Arc<dyn AlertStore>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { store, dispatcher, locks: KeyedMutex::new() }
    }

    pub async fn create(&self, new_alert: NewAlert) -> Result<Alert, AlertError> {
        validate(&new_alert)?;

        let alert = Alert {
            id: AlertId(Uuid::new_v4().to_string()),
            title: new_alert.title,
            description: new_alert.description,
            priority: new_alert.priority,
            source: new_alert.source,
            action_items: new_alert.action_items,
            status: AlertStatus::Active,
            created_at: Utc::now(),
            resolution_notes: None,
            dismissed_at: None,
        };

        self.store.put(alert.clone()).await?;
        info!(
            event_name = "alert.created",
            alert_id = %alert.id.0,
            priority = alert.priority.as_str(),
            source = %alert.source,
            "alert created"
        );

        let channels = alert.priority.channels();
        let deliveries = self.dispatcher.send(&alert, channels).await;
        for delivery in &deliveries {
            match &delivery.status {
                DeliveryStatus::Delivered => info!(
                    event_name = "alert.notification_delivered",
                    alert_id = %alert.id.0,
                    channel = delivery.channel.as_str(),
                    "notification delivered"
                ),
                DeliveryStatus::Failed { detail } => warn!(
                    event_name = "alert.notification_failed",
                    alert_id = %alert.id.0,
                    channel = delivery.channel.as_str(),
                    detail = %detail,
                    "notification delivery failed"
                ),
            }
        }

        Ok(alert)
    }

    pub async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, AlertError> {
        Ok(self.store.query(filter).await?)
    }

    pub async fn dismiss(
        &self,
        alert_id: &AlertId,
        resolution_notes: impl Into<String> + Send,
    ) -> Result<DismissReceipt, AlertError> {
        let _guard = self.locks.lock(&alert_id.0).await;

        let mut alert =
            self.store.get(alert_id).await?.ok_or_else(|| AlertError::NotFound(alert_id.clone()))?;

        let resolution_notes = resolution_notes.into();
        let dismissed_at = Utc::now();
        alert.dismiss(resolution_notes.clone(), dismissed_at)?;
        self.store.update(alert).await?;

        info!(
            event_name = "alert.dismissed",
            alert_id = %alert_id.0,
            "alert dismissed"
        );

        Ok(DismissReceipt { alert_id: alert_id.clone(), dismissed_at, resolution_notes })
    }
}

fn validate(new_alert: &NewAlert) -> Result<(), AlertError> {
    if new_alert.title.trim().is_empty() {
        return Err(AlertError::Validation("title must not be empty".to_string()));
    }
    if new_alert.description.trim().is_empty() {
        return Err(AlertError::Validation("description must not be empty".to_string()));
    }
    if new_alert.source.trim().is_empty() {
        return Err(AlertError::Validation("source must not be empty".to_string()));
    }
    Ok(())
}
