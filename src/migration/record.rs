//! `MigrationRecord` - rows of the `quartermaster_migrations` state table

use crate::executor::DbError;
use crate::model::column;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Timestamp version `YYYYMMDDHHMMSS`
    pub version: i64,
    pub name: String,
    /// SHA-256 of the DDL the migration rendered when it was applied
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    /// `None` if not recorded
    pub execution_time_ms: Option<i64>,
    pub success: bool,
}

impl MigrationRecord {
    #[must_use]
    pub fn new(
        version: i64,
        name: String,
        checksum: String,
        applied_at: DateTime<Utc>,
        execution_time_ms: Option<i64>,
        success: bool,
    ) -> Self {
        Self {
            version,
            name,
            checksum,
            applied_at,
            execution_time_ms,
            success,
        }
    }

    /// Expected columns: `version, name, checksum, applied_at, execution_time_ms, success`
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, DbError> {
        Ok(Self {
            version: column(row, "version")?,
            name: column(row, "name")?,
            checksum: column(row, "checksum")?,
            applied_at: column(row, "applied_at")?,
            execution_time_ms: column(row, "execution_time_ms")?,
            success: column(row, "success")?,
        })
    }
}
