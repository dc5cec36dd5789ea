use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use storemind_core::domain::action::ActionId;
use storemind_core::domain::execution::{ExecutionId, ExecutionRecord, ExecutionResult};
use storemind_core::errors::StoreError;
use storemind_core::stores::ExecutionLedger;

use crate::connection::DbPool;

use super::{column, db_error, parse_datetime, parse_optional_datetime};

/// Idempotency ledger keyed by `(action_id, token_fingerprint)`.
/// The first write for a key wins; a concurrent duplicate insert is a
/// no-op, so the recorded outcome stays authoritative.
#[derive(Clone)]
pub struct SqlExecutionLedger {
    pool: DbPool,
}

impl SqlExecutionLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_record(row: &SqliteRow) -> Result<ExecutionRecord, StoreError> {
    let success: i64 = column(row, "success")?;
    let execution_id: Option<String> = column(row, "execution_id")?;
    let executed_at_raw: Option<String> = column(row, "executed_at")?;
    let recorded_at_raw: String = column(row, "recorded_at")?;

    let result = ExecutionResult {
        success: success != 0,
        execution_id: execution_id.map(ExecutionId),
        executed_at: parse_optional_datetime("executed_at", executed_at_raw)?,
        error_code: column(row, "error_code")?,
        error_message: column(row, "error_message")?,
    };

    Ok(ExecutionRecord {
        action_id: ActionId(column(row, "action_id")?),
        token_fingerprint: column(row, "token_fingerprint")?,
        result,
        recorded_at: parse_datetime("recorded_at", &recorded_at_raw)?,
    })
}

#[async_trait]
impl ExecutionLedger for SqlExecutionLedger {
    async fn find(
        &self,
        action_id: &ActionId,
        token_fingerprint: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT action_id, token_fingerprint, success, execution_id,
                   executed_at, error_code, error_message, recorded_at
            FROM execution_ledger
            WHERE action_id = ?1 AND token_fingerprint = ?2
            "#,
        )
        .bind(&action_id.0)
        .bind(token_fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(map_record).transpose()
    }

    async fn record(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO execution_ledger (
                action_id, token_fingerprint, success, execution_id,
                executed_at, error_code, error_message, recorded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (action_id, token_fingerprint) DO NOTHING
            "#,
        )
        .bind(&record.action_id.0)
        .bind(&record.token_fingerprint)
        .bind(record.result.success as i64)
        .bind(record.result.execution_id.as_ref().map(|id| id.0.clone()))
        .bind(record.result.executed_at.map(|at| at.to_rfc3339()))
        .bind(&record.result.error_code)
        .bind(&record.result.error_message)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}
