use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::action::ActionId;
use crate::errors::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Immutable record of one execution attempt's outcome. Every attempt
/// leaves exactly one terminal record, success or failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub action_id: ActionId,
    pub event_type: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action_id: ActionId, event_type: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            action_id,
            event_type: event_type.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Append-only sink. The core never reads it back except through the
/// in-memory implementation used by tests.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl InMemoryAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn records_for(&self, action_id: &ActionId) -> Vec<AuditRecord> {
        self.records().into_iter().filter(|record| &record.action_id == action_id).collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::action::ActionId;

    use super::{AuditOutcome, AuditRecord, AuditSink, InMemoryAuditSink};

    #[tokio::test]
    async fn in_memory_sink_appends_records_with_metadata() {
        let sink = InMemoryAuditSink::default();
        sink.append(
            AuditRecord::new(
                ActionId("ACT001".to_string()),
                "execution.failed",
                AuditOutcome::Failed,
            )
            .with_metadata("error_code", "invalid_approval")
            .with_metadata("detail", "approval token is missing"),
        )
        .await
        .expect("append");

        let records = sink.records_for(&ActionId("ACT001".to_string()));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, AuditOutcome::Failed);
        assert_eq!(records[0].metadata.get("error_code").map(String::as_str), Some("invalid_approval"));
    }

    #[test]
    fn audit_outcome_round_trips_from_storage_encoding() {
        for outcome in [AuditOutcome::Success, AuditOutcome::Failed] {
            assert_eq!(AuditOutcome::parse(outcome.as_str()), Some(outcome));
        }
    }
}
