//! In-process migration on server start

use crate::executor::DbExecutor;
use crate::migration::{initialize_state_table, MigrationError, MigrationLockGuard, Migrator};

/// Apply every pending embedded migration.
///
/// The first instance to start takes the lock and migrates; others wait for
/// it (up to `timeout_seconds`, default 60) and then find nothing pending.
/// A failure here should stop the server from starting.
pub fn startup_migrations(
    executor: &dyn DbExecutor,
    timeout_seconds: Option<u64>,
) -> Result<usize, MigrationError> {
    let migrator = Migrator::embedded()?;
    initialize_state_table(executor)?;
    let lock = MigrationLockGuard::new(executor, timeout_seconds)?;

    let applied = migrator.up_with_lock(lock.executor(), None)?;
    if applied > 0 {
        log::info!("Applied {applied} migration(s) on startup");
    } else {
        log::debug!("No pending migrations to apply");
    }
    Ok(applied)
}
