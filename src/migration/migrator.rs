//! Migrator - applies and rolls back the embedded migrations

use crate::executor::DbExecutor;
use crate::migration::{
    initialize_state_table, migration_checksum, validate_checksum, Migration, MigrationError,
    MigrationLockGuard, MigrationRecord, MigrationStatus, PendingMigration, SchemaManager,
    STATE_TABLE,
};
use crate::transaction::Transaction;
use chrono::Utc;
use regex::Regex;
use std::collections::HashSet;
use std::time::Instant;

const LOCK_TIMEOUT_SECONDS: u64 = 60;

/// Orchestrates validation, execution and state tracking of a fixed,
/// version-ordered migration list.
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.migrations.iter().map(|m| (m.version(), m.name().to_string())))
            .finish()
    }
}

impl Migrator {
    /// Validate names and require strictly ascending versions.
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Result<Self, MigrationError> {
        let name_pattern = Regex::new(r"^[a-z][a-z0-9_]*$")
            .map_err(|e| MigrationError::InvalidName(format!("invalid name pattern: {e}")))?;
        let mut previous = 0;
        for migration in &migrations {
            if !name_pattern.is_match(migration.name()) {
                return Err(MigrationError::InvalidName(migration.name().to_string()));
            }
            if migration.version() <= previous {
                return Err(MigrationError::InvalidVersion(migration.version()));
            }
            previous = migration.version();
        }
        Ok(Self { migrations })
    }

    /// The schema shipped with this crate.
    pub fn embedded() -> Result<Self, MigrationError> {
        Self::new(crate::migration::schema::all())
    }

    pub fn migrations(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.iter().map(|m| m.as_ref())
    }

    fn find(&self, version: i64) -> Option<&dyn Migration> {
        self.migrations()
            .find(|m| m.version() == version)
    }

    /// Applied vs pending, validating checksums of everything applied.
    pub fn status(&self, executor: &dyn DbExecutor) -> Result<MigrationStatus, MigrationError> {
        initialize_state_table(executor)?;
        let applied = Self::query_applied_migrations(executor)?;

        let known: HashSet<i64> = self.migrations.iter().map(|m| m.version()).collect();
        if let Some(record) = applied.iter().find(|r| !known.contains(&r.version)) {
            return Err(MigrationError::MissingMigration {
                version: record.version,
                name: record.name.clone(),
            });
        }

        let mut pending = Vec::new();
        for migration in self.migrations() {
            let checksum = migration_checksum(migration)?;
            match applied.iter().find(|r| r.version == migration.version()) {
                Some(record) => validate_checksum(migration, &record.checksum, &checksum)?,
                None => pending.push(PendingMigration {
                    version: migration.version(),
                    name: migration.name().to_string(),
                    checksum,
                }),
            }
        }

        Ok(MigrationStatus::new(applied, pending))
    }

    /// Apply up to `steps` pending migrations (all when `None`).
    pub fn up(
        &self,
        executor: &dyn DbExecutor,
        steps: Option<usize>,
    ) -> Result<usize, MigrationError> {
        initialize_state_table(executor)?;
        let lock = MigrationLockGuard::new(executor, Some(LOCK_TIMEOUT_SECONDS))?;
        self.up_with_lock(lock.executor(), steps)
    }

    /// Apply pending migrations while the caller already holds the lock.
    pub fn up_with_lock(
        &self,
        executor: &dyn DbExecutor,
        steps: Option<usize>,
    ) -> Result<usize, MigrationError> {
        let status = self.status(executor)?;
        let take = steps.unwrap_or(status.pending.len());

        let mut applied = 0;
        for pending in status.pending.iter().take(take) {
            let migration = self
                .find(pending.version)
                .ok_or_else(|| MigrationError::InvalidVersion(pending.version))?;
            let start = Instant::now();

            let tx = Transaction::begin(executor)?;
            migration
                .up(&SchemaManager::new(&tx))
                .map_err(|e| MigrationError::ExecutionFailed {
                    version: pending.version,
                    name: pending.name.clone(),
                    error: e.to_string(),
                })?;
            let record = MigrationRecord::new(
                pending.version,
                pending.name.clone(),
                pending.checksum.clone(),
                Utc::now(),
                Some(start.elapsed().as_millis() as i64),
                true,
            );
            Self::record_migration(&tx, &record)?;
            tx.commit()?;

            log::info!("applied migration {} ({})", pending.version, pending.name);
            applied += 1;
        }
        Ok(applied)
    }

    /// Roll back the newest `steps` applied migrations (default 1).
    pub fn down(
        &self,
        executor: &dyn DbExecutor,
        steps: Option<usize>,
    ) -> Result<usize, MigrationError> {
        initialize_state_table(executor)?;
        let lock = MigrationLockGuard::new(executor, Some(LOCK_TIMEOUT_SECONDS))?;
        let executor = lock.executor();

        let mut applied = self.status(executor)?.applied;
        applied.sort_by_key(|m| std::cmp::Reverse(m.version));

        let mut rolled_back = 0;
        for record in applied.iter().take(steps.unwrap_or(1)) {
            let migration = self.find(record.version).ok_or_else(|| {
                MigrationError::MissingMigration {
                    version: record.version,
                    name: record.name.clone(),
                }
            })?;

            let tx = Transaction::begin(executor)?;
            migration
                .down(&SchemaManager::new(&tx))
                .map_err(|e| MigrationError::ExecutionFailed {
                    version: record.version,
                    name: record.name.clone(),
                    error: e.to_string(),
                })?;
            Self::remove_migration_record(&tx, record.version)?;
            tx.commit()?;

            log::info!("rolled back migration {} ({})", record.version, record.name);
            rolled_back += 1;
        }
        Ok(rolled_back)
    }

    /// Excludes the lock row.
    fn query_applied_migrations(
        executor: &dyn DbExecutor,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        let sql = format!(
            "SELECT version, name, checksum, applied_at, execution_time_ms, success \
             FROM {STATE_TABLE} WHERE version > 0 ORDER BY version ASC"
        );
        let rows = executor.query_all(&sql, &[])?;
        rows.iter()
            .map(|row| MigrationRecord::from_row(row).map_err(MigrationError::from))
            .collect()
    }

    fn record_migration(
        executor: &dyn DbExecutor,
        record: &MigrationRecord,
    ) -> Result<(), MigrationError> {
        let sql = format!(
            "INSERT INTO {STATE_TABLE} (version, name, checksum, applied_at, execution_time_ms, success) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        executor.execute(
            &sql,
            &[
                &record.version,
                &record.name,
                &record.checksum,
                &record.applied_at,
                &record.execution_time_ms,
                &record.success,
            ],
        )?;
        Ok(())
    }

    fn remove_migration_record(
        executor: &dyn DbExecutor,
        version: i64,
    ) -> Result<(), MigrationError> {
        let sql = format!("DELETE FROM {STATE_TABLE} WHERE version = $1");
        executor.execute(&sql, &[&version])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DbError;
    use crate::migration::RecordingExecutor;

    struct Named(&'static str, i64);

    impl Migration for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn version(&self) -> i64 {
            self.1
        }

        fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
            manager.execute(&format!("CREATE TABLE {} (id UUID)", self.0))
        }

        fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
            manager.execute(&format!("DROP TABLE {}", self.0))
        }
    }

    #[test]
    fn test_rejects_bad_names() {
        let err = Migrator::new(vec![Box::new(Named("Create-Things", 1))]).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName(_)));
    }

    #[test]
    fn test_rejects_out_of_order_versions() {
        let err = Migrator::new(vec![
            Box::new(Named("second", 20250102000000)),
            Box::new(Named("first", 20250101000000)),
        ])
        .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidVersion(20250101000000)));
    }

    #[test]
    fn test_embedded_schema_is_valid() {
        let migrator = Migrator::embedded().unwrap();
        assert_eq!(migrator.migrations().count(), 4);
    }

    #[test]
    fn test_fresh_database_reports_everything_pending() {
        let recorder = RecordingExecutor::default();
        let migrator = Migrator::embedded().unwrap();
        let status = migrator.status(&recorder).unwrap();
        assert!(status.applied.is_empty());
        assert_eq!(status.pending.len(), 4);
        assert_eq!(status.next_pending_version(), Some(20250301000001));
    }

    #[test]
    fn test_up_runs_each_migration_in_its_own_transaction() {
        let recorder = RecordingExecutor::default();
        let migrator = Migrator::new(vec![
            Box::new(Named("alpha", 20250101000000)),
            Box::new(Named("beta", 20250102000000)),
        ])
        .unwrap();

        assert_eq!(migrator.up(&recorder, Some(1)).unwrap(), 1);

        let statements = recorder.statements();
        let begin = statements.iter().position(|s| s == "BEGIN").unwrap();
        assert_eq!(statements[begin + 1], "CREATE TABLE alpha (id UUID)");
        assert!(statements[begin + 2].starts_with("INSERT INTO quartermaster_migrations"));
        assert_eq!(statements[begin + 3], "COMMIT");
        assert!(!statements.iter().any(|s| s == "CREATE TABLE beta (id UUID)"));
        assert_eq!(
            statements.last().map(String::as_str),
            Some("DELETE FROM quartermaster_migrations WHERE version = -1")
        );
    }
}
