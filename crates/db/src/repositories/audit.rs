use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use storemind_core::audit::{AuditOutcome, AuditRecord, AuditSink};
use storemind_core::domain::action::ActionId;
use storemind_core::errors::StoreError;

use crate::connection::DbPool;

use super::{column, db_error, parse_datetime};

/// Append-only audit table. Rows are keyed by event id and never
/// updated or deleted.
#[derive(Clone)]
pub struct SqlAuditSink {
    pool: DbPool,
}

impl SqlAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Reads back the trail for one action, oldest first. Used by
    /// operational tooling; the core itself only appends.
    pub async fn records_for(&self, action_id: &ActionId) -> Result<Vec<AuditRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, action_id, event_type, outcome, metadata, occurred_at
            FROM audit_record
            WHERE action_id = ?1
            ORDER BY occurred_at ASC, event_id ASC
            "#,
        )
        .bind(&action_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(map_record).collect()
    }
}

fn map_record(row: &SqliteRow) -> Result<AuditRecord, StoreError> {
    let outcome_raw: String = column(row, "outcome")?;
    let outcome = AuditOutcome::parse(&outcome_raw)
        .ok_or_else(|| StoreError::Decode(format!("outcome: unknown value `{outcome_raw}`")))?;

    let metadata_raw: String = column(row, "metadata")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_raw)
        .map_err(|error| StoreError::Decode(format!("metadata: {error}")))?;

    let occurred_at_raw: String = column(row, "occurred_at")?;

    Ok(AuditRecord {
        event_id: column(row, "event_id")?,
        action_id: ActionId(column(row, "action_id")?),
        event_type: column(row, "event_type")?,
        outcome,
        metadata,
        occurred_at: parse_datetime("occurred_at", &occurred_at_raw)?,
    })
}

#[async_trait]
impl AuditSink for SqlAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|error| StoreError::Decode(format!("metadata: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO audit_record (
                event_id, action_id, event_type, outcome, metadata, occurred_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.action_id.0)
        .bind(&record.event_type)
        .bind(record.outcome.as_str())
        .bind(metadata)
        .bind(record.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}
