use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use storemind_core::domain::action::{Action, ActionId, ActionStatus, ActionType};
use storemind_core::errors::StoreError;
use storemind_core::stores::ActionStore;

use crate::connection::DbPool;

use super::{column, db_error, parse_datetime};

#[derive(Clone)]
pub struct SqlActionStore {
    pool: DbPool,
}

impl SqlActionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Actions are authored upstream of the core. This insert exists
    /// for seeding and operational backfills, not for the executor.
    pub async fn insert(&self, action: &Action) -> Result<(), StoreError> {
        let detail = serde_json::to_string(&action.detail)
            .map_err(|error| StoreError::Decode(format!("action detail: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO action (id, action_type, detail, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&action.id.0)
        .bind(action.action_type.as_str())
        .bind(detail)
        .bind(action.status.as_str())
        .bind(action.created_at.to_rfc3339())
        .bind(action.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

fn map_action(row: &SqliteRow) -> Result<Action, StoreError> {
    let action_type_raw: String = column(row, "action_type")?;
    let action_type = ActionType::parse(&action_type_raw).ok_or_else(|| {
        StoreError::Decode(format!("action_type: unknown value `{action_type_raw}`"))
    })?;

    let status_raw: String = column(row, "status")?;
    let status = ActionStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("status: unknown value `{status_raw}`")))?;

    let detail_raw: String = column(row, "detail")?;
    let detail = serde_json::from_str(&detail_raw)
        .map_err(|error| StoreError::Decode(format!("detail: {error}")))?;

    let created_at_raw: String = column(row, "created_at")?;
    let updated_at_raw: String = column(row, "updated_at")?;

    Ok(Action {
        id: ActionId(column(row, "id")?),
        action_type,
        detail,
        status,
        created_at: parse_datetime("created_at", &created_at_raw)?,
        updated_at: parse_datetime("updated_at", &updated_at_raw)?,
    })
}

#[async_trait]
impl ActionStore for SqlActionStore {
    async fn get(&self, id: &ActionId) -> Result<Option<Action>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, action_type, detail, status, created_at, updated_at
            FROM action
            WHERE id = ?1
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(map_action).transpose()
    }

    async fn set_status(&self, id: &ActionId, status: ActionStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE action
            SET status = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(&id.0)
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable(format!("action `{}` missing", id.0)));
        }
        Ok(())
    }
}
