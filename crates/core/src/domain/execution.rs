use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::action::ActionId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

/// Terminal outcome of one execution attempt, returned to the caller
/// as a structured value for both success and failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub execution_id: Option<ExecutionId>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(execution_id: ExecutionId, executed_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            execution_id: Some(execution_id),
            executed_at: Some(executed_at),
            error_code: None,
            error_message: None,
        }
    }

    pub fn failed(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            execution_id: None,
            executed_at: None,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
        }
    }
}

/// Ledger row pinning the outcome of a `(action, token)` pair.
/// A repeated submission with the same token must observe this
/// recorded result instead of re-invoking a connector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub action_id: ActionId,
    pub token_fingerprint: String,
    pub result: ExecutionResult,
    pub recorded_at: DateTime<Utc>,
}
