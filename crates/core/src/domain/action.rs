use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

/// Closed set of state-changing operations the executor can dispatch.
/// Adding a kind of action means adding a variant here and registering
/// a connector for it; there is no string-keyed dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PriceChange,
    ScheduleUpdate,
    InventoryAdjustment,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceChange => "price_change",
            Self::ScheduleUpdate => "schedule_update",
            Self::InventoryAdjustment => "inventory_adjustment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "price_change" => Some(Self::PriceChange),
            "schedule_update" => Some(Self::ScheduleUpdate),
            "inventory_adjustment" => Some(Self::InventoryAdjustment),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Executed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "executed" => Some(Self::Executed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A proposed state-changing operation. Actions are created upstream
/// of this core; the executor reads them and transitions their status
/// once an execution attempt reaches a terminal outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub action_type: ActionType,
    pub detail: serde_json::Value,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
