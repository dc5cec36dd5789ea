use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use storemind_core::domain::alert::{Alert, AlertFilter, AlertId, AlertPriority, AlertStatus};
use storemind_core::errors::StoreError;
use storemind_core::stores::AlertStore;

use crate::connection::DbPool;

use super::{column, db_error, parse_datetime, parse_optional_datetime};

#[derive(Clone)]
pub struct SqlAlertStore {
    pool: DbPool,
}

impl SqlAlertStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_alert(row: &SqliteRow) -> Result<Alert, StoreError> {
    let priority_raw: String = column(row, "priority")?;
    let priority = AlertPriority::parse(&priority_raw)
        .ok_or_else(|| StoreError::Decode(format!("priority: unknown value `{priority_raw}`")))?;

    let status_raw: String = column(row, "status")?;
    let status = AlertStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("status: unknown value `{status_raw}`")))?;

    let action_items_raw: String = column(row, "action_items")?;
    let action_items: Vec<String> = serde_json::from_str(&action_items_raw)
        .map_err(|error| StoreError::Decode(format!("action_items: {error}")))?;

    let created_at_raw: String = column(row, "created_at")?;
    let dismissed_at_raw: Option<String> = column(row, "dismissed_at")?;

    Ok(Alert {
        id: AlertId(column(row, "id")?),
        title: column(row, "title")?,
        description: column(row, "description")?,
        priority,
        source: column(row, "source")?,
        action_items,
        status,
        created_at: parse_datetime("created_at", &created_at_raw)?,
        resolution_notes: column(row, "resolution_notes")?,
        dismissed_at: parse_optional_datetime("dismissed_at", dismissed_at_raw)?,
    })
}

fn encode_action_items(alert: &Alert) -> Result<String, StoreError> {
    serde_json::to_string(&alert.action_items)
        .map_err(|error| StoreError::Decode(format!("action_items: {error}")))
}

#[async_trait]
impl AlertStore for SqlAlertStore {
    async fn put(&self, alert: Alert) -> Result<(), StoreError> {
        let action_items = encode_action_items(&alert)?;

        sqlx::query(
            r#"
            INSERT INTO alert (
                id, title, description, priority, source, action_items,
                status, created_at, resolution_notes, dismissed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&alert.id.0)
        .bind(&alert.title)
        .bind(&alert.description)
        .bind(alert.priority.as_str())
        .bind(&alert.source)
        .bind(action_items)
        .bind(alert.status.as_str())
        .bind(alert.created_at.to_rfc3339())
        .bind(&alert.resolution_notes)
        .bind(alert.dismissed_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn get(&self, id: &AlertId) -> Result<Option<Alert>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, priority, source, action_items,
                   status, created_at, resolution_notes, dismissed_at
            FROM alert
            WHERE id = ?1
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(map_alert).transpose()
    }

    async fn update(&self, alert: Alert) -> Result<(), StoreError> {
        let action_items = encode_action_items(&alert)?;

        let result = sqlx::query(
            r#"
            UPDATE alert
            SET title = ?2, description = ?3, priority = ?4, source = ?5,
                action_items = ?6, status = ?7, resolution_notes = ?8,
                dismissed_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&alert.id.0)
        .bind(&alert.title)
        .bind(&alert.description)
        .bind(alert.priority.as_str())
        .bind(&alert.source)
        .bind(action_items)
        .bind(alert.status.as_str())
        .bind(&alert.resolution_notes)
        .bind(alert.dismissed_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable(format!("alert `{}` missing", alert.id.0)));
        }
        Ok(())
    }

    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let mut sql = String::from(
            "SELECT id, title, description, priority, source, action_items, \
             status, created_at, resolution_notes, dismissed_at \
             FROM alert WHERE 1 = 1",
        );
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.priority.is_some() {
            sql.push_str(" AND priority = ?");
        }
        if filter.source.is_some() {
            sql.push_str(" AND source = ? COLLATE NOCASE");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            query = query.bind(priority.as_str());
        }
        if let Some(source) = &filter.source {
            query = query.bind(source);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(map_alert).collect()
    }
}
