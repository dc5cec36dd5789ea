//! SQLite-backed implementations of the core storage traits.
//!
//! Timestamps are stored as RFC3339 TEXT, JSON payloads as TEXT.
//! sqlx failures surface as `StoreError::Unavailable`, unreadable rows
//! as `StoreError::Decode`; the core decides what to do with either.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use storemind_core::errors::StoreError;

pub mod action;
pub mod alert;
pub mod audit;
pub mod ledger;

pub use action::SqlActionStore;
pub use alert::SqlAlertStore;
pub use audit::SqlAuditSink;
pub use ledger::SqlExecutionLedger;

pub(crate) fn db_error(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|error| StoreError::Decode(format!("{name}: {error}")))
}

pub(crate) fn parse_datetime(name: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode(format!("{name}: {error}")))
}

pub(crate) fn parse_optional_datetime(
    name: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|value| parse_datetime(name, &value)).transpose()
}
