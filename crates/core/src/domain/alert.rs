use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AlertError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Informational,
    Actionable,
    Critical,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Actionable => "actionable",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "informational" => Some(Self::Informational),
            "actionable" => Some(Self::Actionable),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Notification fanout policy. Critical alerts page over every
    /// channel; informational ones stay in-app.
    pub fn channels(&self) -> &'static [NotificationChannel] {
        match self {
            Self::Critical => {
                &[NotificationChannel::Sms, NotificationChannel::Email, NotificationChannel::InApp]
            }
            Self::Actionable => &[NotificationChannel::Email, NotificationChannel::InApp],
            Self::Informational => &[NotificationChannel::InApp],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Sms,
    Email,
    InApp,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::InApp => "in_app",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// An operational notice. Alerts are never deleted; the only
/// transition is `Active -> Dismissed`, and dismissal is terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub title: String,
    pub description: String,
    pub priority: AlertPriority,
    pub source: String,
    pub action_items: Vec<String>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolution_notes: Option<String>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn dismiss(
        &mut self,
        resolution_notes: impl Into<String>,
        dismissed_at: DateTime<Utc>,
    ) -> Result<(), AlertError> {
        match self.status {
            AlertStatus::Active => {
                self.status = AlertStatus::Dismissed;
                self.resolution_notes = Some(resolution_notes.into());
                self.dismissed_at = Some(dismissed_at);
                Ok(())
            }
            AlertStatus::Dismissed => {
                Err(AlertError::InvalidState { alert_id: self.id.clone(), status: self.status })
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub priority: Option<AlertPriority>,
    pub source: Option<String>,
    pub limit: Option<u32>,
}

impl AlertFilter {
    pub fn active() -> Self {
        Self { status: Some(AlertStatus::Active), ..Self::default() }
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if let Some(status) = self.status {
            if alert.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if alert.priority != priority {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if !alert.source.eq_ignore_ascii_case(source) {
                return false;
            }
        }
        true
    }
}
