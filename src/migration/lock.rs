//! Flyway-style locking through the migration table itself.
//!
//! The process that manages to insert the row with version `-1` holds the
//! lock; the guard deletes it again on drop.

use super::state_table::STATE_TABLE;
use super::MigrationError;
use crate::executor::DbExecutor;
use std::time::{Duration, Instant};

/// Reserved version of the lock row. Real migrations use positive timestamps.
const LOCK_VERSION: i64 = -1;

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

pub struct MigrationLockGuard<'a> {
    executor: &'a dyn DbExecutor,
}

impl<'a> MigrationLockGuard<'a> {
    /// Acquire the lock, polling for up to `timeout_seconds` (default 60).
    pub fn new(
        executor: &'a dyn DbExecutor,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, MigrationError> {
        acquire_migration_lock(executor, timeout_seconds.unwrap_or(60))?;
        Ok(Self { executor })
    }

    pub fn executor(&self) -> &'a dyn DbExecutor {
        self.executor
    }
}

impl Drop for MigrationLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = release_migration_lock(self.executor) {
            log::error!("failed to release migration lock: {e}");
        }
    }
}

fn acquire_migration_lock(
    executor: &dyn DbExecutor,
    timeout_seconds: u64,
) -> Result<(), MigrationError> {
    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_seconds);

    // Bound each attempt so a hung INSERT cannot outlive the overall timeout.
    let _ = executor.execute("SET statement_timeout = '5s'", &[]);

    let sql = format!(
        "INSERT INTO {STATE_TABLE} (version, name, checksum, applied_at, success) \
         VALUES ({LOCK_VERSION}, 'LOCK', 'lock', NOW(), true) \
         ON CONFLICT (version) DO NOTHING"
    );

    loop {
        if start.elapsed() >= timeout {
            let _ = executor.execute("RESET statement_timeout", &[]);
            return Err(MigrationError::LockTimeout(format!(
                "could not acquire the migration lock within {timeout_seconds} seconds. \
                 If no migration is running, remove the lock row: \
                 DELETE FROM {STATE_TABLE} WHERE version = {LOCK_VERSION}"
            )));
        }

        match executor.execute(&sql, &[]) {
            Ok(rows) if rows > 0 => {
                let _ = executor.execute("RESET statement_timeout", &[]);
                log::debug!("migration lock acquired");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                let message = e.to_string();
                if !(message.contains("timeout") || message.contains("canceling statement")) {
                    let _ = executor.execute("RESET statement_timeout", &[]);
                    return Err(MigrationError::Database(e));
                }
            }
        }

        may::coroutine::sleep(RETRY_INTERVAL);
    }
}

fn release_migration_lock(executor: &dyn DbExecutor) -> Result<(), MigrationError> {
    let sql = format!("DELETE FROM {STATE_TABLE} WHERE version = {LOCK_VERSION}");
    executor.execute(&sql, &[])?;
    Ok(())
}

pub fn is_migration_lock_held(executor: &dyn DbExecutor) -> Result<bool, MigrationError> {
    let sql = format!("SELECT COUNT(*) AS n FROM {STATE_TABLE} WHERE version = {LOCK_VERSION}");
    let row = executor.query_one(&sql, &[])?;
    let count: i64 = crate::model::column(&row, "n")?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::RecordingExecutor;

    #[test]
    fn test_guard_inserts_and_removes_lock_row() {
        let recorder = RecordingExecutor::default();
        {
            let _guard = MigrationLockGuard::new(&recorder, Some(1)).unwrap();
        }
        let statements = recorder.statements();
        assert_eq!(statements[0], "SET statement_timeout = '5s'");
        assert!(statements[1].starts_with("INSERT INTO quartermaster_migrations"));
        assert!(statements[1].ends_with("ON CONFLICT (version) DO NOTHING"));
        assert_eq!(statements[2], "RESET statement_timeout");
        assert_eq!(
            statements.last().map(String::as_str),
            Some("DELETE FROM quartermaster_migrations WHERE version = -1")
        );
    }

    #[test]
    fn test_held_lock_times_out() {
        let recorder = RecordingExecutor::with_rows_affected(0);
        let err = MigrationLockGuard::new(&recorder, Some(0)).err().unwrap();
        assert!(matches!(err, MigrationError::LockTimeout(_)));
    }
}
