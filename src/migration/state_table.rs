//! Migration state table management

use crate::executor::{DbError, DbExecutor};

pub const STATE_TABLE: &str = "quartermaster_migrations";

/// Create `quartermaster_migrations` and its index if missing.
///
/// Columns: version, name, SHA-256 checksum of the rendered DDL, applied
/// timestamp, execution time and success flag. The row with version `-1`
/// is the migration lock.
pub fn initialize_state_table(executor: &dyn DbExecutor) -> Result<(), DbError> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {STATE_TABLE} (
            version BIGINT PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            checksum VARCHAR(64) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL,
            execution_time_ms BIGINT,
            success BOOLEAN NOT NULL DEFAULT true
        )"
    );
    executor.execute(&sql, &[])?;

    let index_sql = format!(
        "CREATE INDEX IF NOT EXISTS idx_{STATE_TABLE}_applied_at ON {STATE_TABLE}(applied_at)"
    );
    executor.execute(&index_sql, &[])?;

    Ok(())
}
