use thiserror::Error;

use crate::approvals::ApprovalDenial;
use crate::domain::action::{ActionId, ActionStatus, ActionType};
use crate::domain::alert::{AlertId, AlertStatus};

/// Failure of a storage collaborator. Everything the core cannot
/// interpret is surfaced to the caller, never retried silently.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

/// Domain-level reasons an execution attempt terminates without a
/// connector success. Each maps to a stable error code carried on the
/// `ExecutionResult` and into the audit trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecuteFailure {
    InvalidApproval(ApprovalDenial),
    NotFound { action_id: ActionId },
    InvalidState { action_id: ActionId, status: ActionStatus },
    UnknownActionType { action_type: ActionType },
    ConnectorUnavailable { detail: String },
    Timeout { timeout_secs: u64 },
}

impl ExecuteFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidApproval(_) => "invalid_approval",
            Self::NotFound { .. } => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::UnknownActionType { .. } => "unknown_action_type",
            Self::ConnectorUnavailable { .. } => "connector_unavailable",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Caller-facing message. Structured detail stays in the audit
    /// metadata; the message itself is safe to relay to an operator.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidApproval(_) => "Invalid approval token".to_string(),
            Self::NotFound { action_id } => format!("action `{}` was not found", action_id.0),
            Self::InvalidState { action_id, status } => {
                format!("action `{}` is `{}` and cannot be executed", action_id.0, status.as_str())
            }
            Self::UnknownActionType { action_type } => {
                format!("no connector is registered for action type `{}`", action_type.as_str())
            }
            Self::ConnectorUnavailable { detail } => format!("connector unavailable: {detail}"),
            Self::Timeout { timeout_secs } => {
                format!("connector did not respond within {timeout_secs}s")
            }
        }
    }

    /// Detail string for audit metadata, more specific than the
    /// caller-facing message.
    pub fn audit_detail(&self) -> String {
        match self {
            Self::InvalidApproval(denial) => denial.reason(),
            other => other.message(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AlertError {
    #[error("alert `{id}` was not found", id = .0.0)]
    NotFound(AlertId),
    #[error("alert `{id}` is `{state}` and cannot be dismissed", id = .alert_id.0, state = .status.as_str())]
    InvalidState { alert_id: AlertId, status: AlertStatus },
    #[error("alert validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AlertError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "That alert does not exist.".to_string(),
            Self::InvalidState { .. } => "That alert has already been dismissed.".to_string(),
            Self::Validation(detail) => format!("The alert is incomplete: {detail}."),
            Self::Store(_) => "The alert service is temporarily unavailable.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::approvals::ApprovalDenial;
    use crate::domain::action::{ActionId, ActionStatus, ActionType};
    use crate::domain::alert::{AlertId, AlertStatus};

    use super::{AlertError, ExecuteFailure, StoreError};

    #[test]
    fn execute_failure_codes_are_stable() {
        let cases = [
            (ExecuteFailure::InvalidApproval(ApprovalDenial::MissingToken), "invalid_approval"),
            (ExecuteFailure::NotFound { action_id: ActionId("ACT001".into()) }, "not_found"),
            (
                ExecuteFailure::InvalidState {
                    action_id: ActionId("ACT001".into()),
                    status: ActionStatus::Executed,
                },
                "invalid_state",
            ),
            (
                ExecuteFailure::UnknownActionType { action_type: ActionType::PriceChange },
                "unknown_action_type",
            ),
            (
                ExecuteFailure::ConnectorUnavailable { detail: "503".into() },
                "connector_unavailable",
            ),
            (ExecuteFailure::Timeout { timeout_secs: 30 }, "timeout"),
        ];

        for (failure, code) in cases {
            assert_eq!(failure.code(), code);
        }
    }

    #[test]
    fn invalid_approval_message_is_operator_safe() {
        let failure = ExecuteFailure::InvalidApproval(ApprovalDenial::BadSignature);
        assert_eq!(failure.message(), "Invalid approval token");
        assert_ne!(failure.audit_detail(), failure.message());
    }

    #[test]
    fn invalid_state_error_names_alert_and_status() {
        let error = AlertError::InvalidState {
            alert_id: AlertId("AL-9".into()),
            status: AlertStatus::Dismissed,
        };
        assert_eq!(error.to_string(), "alert `AL-9` is `dismissed` and cannot be dismissed");
    }

    #[test]
    fn store_errors_surface_as_unavailable_alert_service() {
        let error = AlertError::from(StoreError::Unavailable("lock timeout".into()));
        assert_eq!(error.user_message(), "The alert service is temporarily unavailable.");
    }
}
