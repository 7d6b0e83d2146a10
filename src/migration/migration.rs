//! Migration trait definition

use super::schema_manager::SchemaManager;
use crate::executor::DbError;

/// A versioned schema change.
///
/// Migrations are synchronous: the may runtime schedules the coroutine
/// while the executor waits on PostgreSQL.
pub trait Migration: Send + Sync {
    /// Human-readable identifier, lowercase snake_case.
    fn name(&self) -> &str;

    /// Timestamp version `YYYYMMDDHHMMSS`.
    fn version(&self) -> i64;

    /// Apply the migration.
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError>;

    /// Undo the migration.
    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError>;
}
