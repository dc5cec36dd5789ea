//! Action execution pipeline: approval gate, connector dispatch,
//! idempotency ledger, and unconditional auditing.
//!
//! Every call that reaches a terminal outcome leaves exactly one audit
//! record, success or failure. A `(action, token)` pair that already
//! executed successfully is replayed from the ledger without touching
//! the gate or any connector, so duplicate submissions can never
//! double-invoke an external effect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::approvals::{token_fingerprint, ApprovalGate};
use crate::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::connectors::ConnectorRegistry;
use crate::domain::action::{ActionId, ActionStatus};
use crate::domain::execution::{ExecutionRecord, ExecutionResult};
use crate::errors::{ExecuteFailure, StoreError};
use crate::stores::{ActionStore, ExecutionLedger};
use crate::sync::KeyedMutex;

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Bound on each connector call; elapsed calls surface as a
    /// `timeout` failure and are never silently retried.
    pub connector_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { connector_timeout_secs: 30 }
    }
}

/// Orchestrates load -> validate -> dispatch -> audit for a single
/// action. All collaborators are injected; the executor owns no state
/// beyond its per-action locks.
pub struct ActionExecutor {
    actions: Arc<dyn ActionStore>,
    ledger: Arc<dyn ExecutionLedger>,
    audit: Arc<dyn AuditSink>,
    connectors: ConnectorRegistry,
    gate: ApprovalGate,
    locks: KeyedMutex,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(
        actions: Arc<dyn ActionStore>,
        ledger: Arc<dyn ExecutionLedger>,
        audit: Arc<dyn AuditSink>,
        connectors: ConnectorRegistry,
        gate: ApprovalGate,
    ) -> Self {
        Self::with_config(actions, ledger, audit, connectors, gate, ExecutorConfig::default())
    }

    pub fn with_config(
        actions: Arc<dyn ActionStore>,
        ledger: Arc<dyn ExecutionLedger>,
        audit: Arc<dyn AuditSink>,
        connectors: ConnectorRegistry,
        gate: ApprovalGate,
        config: ExecutorConfig,
    ) -> Self {
        Self { actions, ledger, audit, connectors, gate, locks: KeyedMutex::new(), config }
    }

    /// Execute `action_id` under the presented approval token.
    ///
    /// Domain failures (bad token, unknown type, missing action,
    /// connector trouble) come back as a failed [`ExecutionResult`];
    /// `Err` is reserved for storage collaborators being unavailable.
    pub async fn execute(
        &self,
        action_id: &ActionId,
        token: &str,
        params: &serde_json::Value,
    ) -> Result<ExecutionResult, StoreError> {
        let _guard = self.locks.lock(&action_id.0).await;

        let fingerprint = token_fingerprint(token);
        if let Some(record) = self.ledger.find(action_id, &fingerprint).await? {
            info!(
                event_name = "execution.replayed",
                action_id = %action_id.0,
                "duplicate submission observed the ledgered result"
            );
            self.audit
                .append(
                    AuditRecord::new(action_id.clone(), "execution.replayed", AuditOutcome::Success)
                        .with_metadata(
                            "execution_id",
                            record
                                .result
                                .execution_id
                                .as_ref()
                                .map(|id| id.0.clone())
                                .unwrap_or_default(),
                        ),
                )
                .await?;
            return Ok(record.result);
        }

        let decision = self.gate.validate(action_id, token, params);
        if !decision.allowed {
            let denial = decision.denial.unwrap_or(crate::approvals::ApprovalDenial::MissingToken);
            return self.audit_failure(action_id, ExecuteFailure::InvalidApproval(denial)).await;
        }

        let Some(action) = self.actions.get(action_id).await? else {
            return self
                .audit_failure(action_id, ExecuteFailure::NotFound { action_id: action_id.clone() })
                .await;
        };

        // An executed action is terminal; only the exact (action, token)
        // pair that produced it may replay. A failed action stays
        // retryable under a fresh token.
        if action.status == ActionStatus::Executed {
            return self
                .audit_failure(
                    action_id,
                    ExecuteFailure::InvalidState {
                        action_id: action_id.clone(),
                        status: action.status,
                    },
                )
                .await;
        }

        let Some(connector) = self.connectors.get(&action.action_type) else {
            return self
                .audit_failure(
                    action_id,
                    ExecuteFailure::UnknownActionType { action_type: action.action_type },
                )
                .await;
        };

        let timeout = Duration::from_secs(self.config.connector_timeout_secs);
        let receipt = match tokio::time::timeout(timeout, connector.invoke(&action, params)).await {
            Err(_elapsed) => {
                self.actions.set_status(action_id, ActionStatus::Failed).await?;
                return self
                    .audit_failure(
                        action_id,
                        ExecuteFailure::Timeout {
                            timeout_secs: self.config.connector_timeout_secs,
                        },
                    )
                    .await;
            }
            Ok(Err(error)) => {
                self.actions.set_status(action_id, ActionStatus::Failed).await?;
                return self
                    .audit_failure(
                        action_id,
                        ExecuteFailure::ConnectorUnavailable { detail: error.to_string() },
                    )
                    .await;
            }
            Ok(Ok(receipt)) => receipt,
        };

        self.actions.set_status(action_id, ActionStatus::Executed).await?;

        let result = ExecutionResult::succeeded(receipt.execution_id, receipt.executed_at);
        self.ledger
            .record(ExecutionRecord {
                action_id: action_id.clone(),
                token_fingerprint: fingerprint,
                result: result.clone(),
                recorded_at: Utc::now(),
            })
            .await?;

        self.audit
            .append(
                AuditRecord::new(action_id.clone(), "execution.completed", AuditOutcome::Success)
                    .with_metadata(
                        "execution_id",
                        result.execution_id.as_ref().map(|id| id.0.clone()).unwrap_or_default(),
                    ),
            )
            .await?;
        info!(
            event_name = "execution.completed",
            action_id = %action_id.0,
            execution_id = result.execution_id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
            "action executed"
        );

        Ok(result)
    }

    async fn audit_failure(
        &self,
        action_id: &ActionId,
        failure: ExecuteFailure,
    ) -> Result<ExecutionResult, StoreError> {
        warn!(
            event_name = "execution.failed",
            action_id = %action_id.0,
            error_code = failure.code(),
            detail = %failure.audit_detail(),
            "execution attempt failed"
        );
        self.audit
            .append(
                AuditRecord::new(action_id.clone(), "execution.failed", AuditOutcome::Failed)
                    .with_metadata("error_code", failure.code())
                    .with_metadata("detail", failure.audit_detail()),
            )
            .await?;

        Ok(ExecutionResult::failed(failure.code(), failure.message()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::json;
    use uuid::Uuid;

    use crate::approvals::{ApprovalGate, TokenIssuer};
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::connectors::{
        ActionConnector, ConnectorError, ConnectorReceipt, ConnectorRegistry,
    };
    use crate::domain::action::{Action, ActionId, ActionStatus, ActionType};
    use crate::stores::{ActionStore, InMemoryActionStore, InMemoryExecutionLedger};

    use super::{ActionExecutor, ExecutorConfig};

    struct CountingConnector {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActionConnector for CountingConnector {
        async fn invoke(
            &self,
            _action: &Action,
            _params: &serde_json::Value,
        ) -> Result<ConnectorReceipt, ConnectorError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(ConnectorReceipt {
                execution_id: crate::domain::execution::ExecutionId(Uuid::new_v4().to_string()),
                executed_at: Utc::now(),
            })
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl ActionConnector for FailingConnector {
        async fn invoke(
            &self,
            _action: &Action,
            _params: &serde_json::Value,
        ) -> Result<ConnectorReceipt, ConnectorError> {
            Err(ConnectorError::Unavailable("pricing system returned 503".to_string()))
        }
    }

    struct HangingConnector;

    #[async_trait]
    impl ActionConnector for HangingConnector {
        async fn invoke(
            &self,
            _action: &Action,
            _params: &serde_json::Value,
        ) -> Result<ConnectorReceipt, ConnectorError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Err(ConnectorError::Unavailable("unreachable".to_string()))
        }
    }

    fn pending_action(id: &str, action_type: ActionType) -> Action {
        let now = Utc::now();
        Action {
            id: ActionId(id.to_string()),
            action_type,
            detail: json!({"sku": "STRAW-1"}),
            status: ActionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    struct Harness {
        executor: ActionExecutor,
        actions: Arc<InMemoryActionStore>,
        ledger: Arc<InMemoryExecutionLedger>,
        audit: Arc<InMemoryAuditSink>,
        issuer: TokenIssuer,
        invocations: Arc<AtomicUsize>,
    }

    fn harness_with(registry: impl FnOnce(Arc<AtomicUsize>) -> ConnectorRegistry) -> Harness {
        let key = SecretString::from("test-signing-key".to_string());
        let actions =
            Arc::new(InMemoryActionStore::with_actions(vec![pending_action(
                "ACT001",
                ActionType::PriceChange,
            )]));
        let ledger = Arc::new(InMemoryExecutionLedger::default());
        let audit = Arc::new(InMemoryAuditSink::default());
        let invocations = Arc::new(AtomicUsize::new(0));

        let executor = ActionExecutor::new(
            actions.clone(),
            ledger.clone(),
            audit.clone(),
            registry(invocations.clone()),
            ApprovalGate::new(key.clone()),
        );

        Harness {
            executor,
            actions,
            ledger,
            audit,
            issuer: TokenIssuer::new(key, 3600),
            invocations,
        }
    }

    fn harness() -> Harness {
        harness_with(|invocations| {
            ConnectorRegistry::new()
                .register(ActionType::PriceChange, Arc::new(CountingConnector { invocations }))
        })
    }

    #[tokio::test]
    async fn missing_token_fails_with_one_failed_audit_record() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());

        let result = h.executor.execute(&action_id, "", &json!({})).await.expect("execute");

        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Invalid approval token"));
        assert_eq!(result.error_code.as_deref(), Some("invalid_approval"));

        let records = h.audit.records_for(&action_id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, AuditOutcome::Failed);
        assert_eq!(h.invocations.load(Ordering::SeqCst), 0);
        assert!(h.ledger.is_empty());
    }

    #[tokio::test]
    async fn valid_token_executes_and_audits_success() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());
        let params = json!({"sku": "STRAW-1", "price_cents": 299});
        let token = h.issuer.issue(&action_id, &params).expect("token");

        let result =
            h.executor.execute(&action_id, &token.value, &params).await.expect("execute");

        assert!(result.success);
        assert!(result.execution_id.is_some());
        assert!(result.executed_at.is_some());
        assert_eq!(h.invocations.load(Ordering::SeqCst), 1);

        let stored = h.actions.get(&action_id).await.expect("get").expect("present");
        assert_eq!(stored.status, ActionStatus::Executed);

        let records = h.audit.records_for(&action_id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "execution.completed");
        assert_eq!(records[0].outcome, AuditOutcome::Success);
    }

    #[tokio::test]
    async fn repeated_execution_replays_the_recorded_result() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());
        let params = json!({"sku": "STRAW-1"});
        let token = h.issuer.issue(&action_id, &params).expect("token");

        let first =
            h.executor.execute(&action_id, &token.value, &params).await.expect("first");
        let second =
            h.executor.execute(&action_id, &token.value, &params).await.expect("second");

        assert_eq!(first.execution_id, second.execution_id);
        assert_eq!(h.invocations.load(Ordering::SeqCst), 1);

        let records = h.audit.records_for(&action_id);
        let event_types: Vec<&str> =
            records.iter().map(|record| record.event_type.as_str()).collect();
        assert_eq!(event_types, vec!["execution.completed", "execution.replayed"]);
    }

    #[tokio::test]
    async fn replay_works_even_after_the_token_expired() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());
        let params = json!({"sku": "STRAW-1"});
        // Expires one hour from issue; the ledger hit must short-circuit
        // gate validation entirely.
        let token = h
            .issuer
            .issue_at(&action_id, &params, Utc::now() - chrono::Duration::hours(2))
            .expect("token");

        let first = h.executor.execute(&action_id, &token.value, &params).await.expect("first");
        assert!(!first.success, "expired token must not execute");

        let fresh = h.issuer.issue(&action_id, &params).expect("token");
        let executed =
            h.executor.execute(&action_id, &fresh.value, &params).await.expect("fresh");
        assert!(executed.success);

        let replayed =
            h.executor.execute(&action_id, &fresh.value, &params).await.expect("replay");
        assert_eq!(replayed.execution_id, executed.execution_id);
    }

    #[tokio::test]
    async fn executed_action_rejects_a_fresh_token_for_new_params() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());
        let first_params = json!({"sku": "STRAW-1", "price_cents": 299});
        let first_token = h.issuer.issue(&action_id, &first_params).expect("token");

        let first = h
            .executor
            .execute(&action_id, &first_token.value, &first_params)
            .await
            .expect("first");
        assert!(first.success);

        let second_params = json!({"sku": "STRAW-1", "price_cents": 199});
        let second_token = h.issuer.issue(&action_id, &second_params).expect("token");
        let second = h
            .executor
            .execute(&action_id, &second_token.value, &second_params)
            .await
            .expect("second");

        assert!(!second.success);
        assert_eq!(second.error_code.as_deref(), Some("invalid_state"));
        assert_eq!(h.invocations.load(Ordering::SeqCst), 1, "terminal action never re-executes");
    }

    #[tokio::test]
    async fn failed_action_is_retryable_with_a_fresh_token() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());
        h.actions.set_status(&action_id, ActionStatus::Failed).await.expect("set status");

        let params = json!({"sku": "STRAW-1"});
        let token = h.issuer.issue(&action_id, &params).expect("token");
        let result = h.executor.execute(&action_id, &token.value, &params).await.expect("execute");

        assert!(result.success);
        let stored = h.actions.get(&action_id).await.expect("get").expect("present");
        assert_eq!(stored.status, ActionStatus::Executed);
    }

    #[tokio::test]
    async fn unknown_action_is_not_found() {
        let h = harness();
        let action_id = ActionId("ACT404".to_string());
        let params = json!({});
        let token = h.issuer.issue(&action_id, &params).expect("token");

        let result =
            h.executor.execute(&action_id, &token.value, &params).await.expect("execute");

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("not_found"));
        assert_eq!(h.audit.records_for(&action_id).len(), 1);
    }

    #[tokio::test]
    async fn unregistered_connector_is_unknown_action_type() {
        let h = harness_with(|_| ConnectorRegistry::new());
        let action_id = ActionId("ACT001".to_string());
        let params = json!({});
        let token = h.issuer.issue(&action_id, &params).expect("token");

        let result =
            h.executor.execute(&action_id, &token.value, &params).await.expect("execute");

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("unknown_action_type"));
        assert_eq!(h.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connector_failure_is_audited_and_marks_the_action_failed() {
        let h = harness_with(|_| {
            ConnectorRegistry::new().register(ActionType::PriceChange, Arc::new(FailingConnector))
        });
        let action_id = ActionId("ACT001".to_string());
        let params = json!({});
        let token = h.issuer.issue(&action_id, &params).expect("token");

        let result =
            h.executor.execute(&action_id, &token.value, &params).await.expect("execute");

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("connector_unavailable"));

        let stored = h.actions.get(&action_id).await.expect("get").expect("present");
        assert_eq!(stored.status, ActionStatus::Failed);

        // Failures stay out of the ledger so the caller may retry.
        assert!(h.ledger.is_empty());
        assert_eq!(h.audit.records_for(&action_id).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_connector_times_out() {
        let key = SecretString::from("test-signing-key".to_string());
        let actions = Arc::new(InMemoryActionStore::with_actions(vec![pending_action(
            "ACT001",
            ActionType::PriceChange,
        )]));
        let audit = Arc::new(InMemoryAuditSink::default());
        let executor = ActionExecutor::with_config(
            actions.clone(),
            Arc::new(InMemoryExecutionLedger::default()),
            audit.clone(),
            ConnectorRegistry::new()
                .register(ActionType::PriceChange, Arc::new(HangingConnector)),
            ApprovalGate::new(key.clone()),
            ExecutorConfig { connector_timeout_secs: 5 },
        );

        let action_id = ActionId("ACT001".to_string());
        let params = json!({});
        let token = TokenIssuer::new(key, 3600).issue(&action_id, &params).expect("token");

        let result = executor.execute(&action_id, &token.value, &params).await.expect("execute");

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("timeout"));
        assert_eq!(audit.records_for(&action_id).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_submissions_invoke_the_connector_once() {
        let h = harness();
        let action_id = ActionId("ACT001".to_string());
        let params = json!({"sku": "STRAW-1"});
        let token = h.issuer.issue(&action_id, &params).expect("token");

        let executor = Arc::new(h.executor);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let executor = executor.clone();
            let action_id = action_id.clone();
            let token_value = token.value.clone();
            let params = params.clone();
            handles.push(tokio::spawn(async move {
                executor.execute(&action_id, &token_value, &params).await.expect("execute")
            }));
        }

        let mut execution_ids = Vec::new();
        for handle in handles {
            let result = handle.await.expect("join");
            assert!(result.success);
            execution_ids.push(result.execution_id.expect("execution id"));
        }

        execution_ids.dedup();
        assert_eq!(execution_ids.len(), 1, "all submissions observed one execution");
        assert_eq!(h.invocations.load(Ordering::SeqCst), 1);
    }
}
