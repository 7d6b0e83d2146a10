//! Checksums of embedded migrations.
//!
//! Migrations live in the binary, so the checksum covers what a migration
//! does rather than a source file: its `up` is rendered against a
//! [`RecordingExecutor`] and the resulting statements are hashed.

use super::{Migration, MigrationError, RecordingExecutor, SchemaManager};
use sha2::{Digest, Sha256};

/// Hexadecimal SHA-256 of the statements `migration.up()` issues.
pub fn migration_checksum(migration: &dyn Migration) -> Result<String, MigrationError> {
    let recorder = RecordingExecutor::default();
    migration
        .up(&SchemaManager::new(&recorder))
        .map_err(|e| MigrationError::ExecutionFailed {
            version: migration.version(),
            name: migration.name().to_string(),
            error: e.to_string(),
        })?;

    let mut hasher = Sha256::new();
    for statement in recorder.statements() {
        hasher.update(statement.as_bytes());
        hasher.update(b";\n");
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare a stored checksum against the current one.
pub fn validate_checksum(
    migration: &dyn Migration,
    stored_checksum: &str,
    current_checksum: &str,
) -> Result<(), MigrationError> {
    if stored_checksum == current_checksum {
        Ok(())
    } else {
        Err(MigrationError::ChecksumMismatch {
            version: migration.version(),
            name: migration.name().to_string(),
            stored: stored_checksum.to_string(),
            current: current_checksum.to_string(),
        })
    }
}
