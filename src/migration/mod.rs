//! Schema migrations for the quartermaster database.
//!
//! Migrations are compiled into the binary (see [`schema`]) and applied by
//! the [`Migrator`], which tracks them in the `quartermaster_migrations`
//! table. Each applied migration stores a SHA-256 checksum of the DDL it
//! renders, so editing a migration after it ran is detected on the next
//! `status`/`up`.
//!
//! # Example
//!
//! ```rust,no_run
//! use quartermaster::migration::{Migration, SchemaManager};
//! use quartermaster::DbError;
//! use sea_query::{ColumnDef, Table};
//!
//! pub struct CreateSuppliers;
//!
//! impl Migration for CreateSuppliers {
//!     fn name(&self) -> &str {
//!         "create_suppliers"
//!     }
//!
//!     fn version(&self) -> i64 {
//!         20250401120000
//!     }
//!
//!     fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
//!         manager.create_table(
//!             Table::create()
//!                 .table("suppliers")
//!                 .col(ColumnDef::new("id").uuid().not_null().primary_key())
//!                 .col(ColumnDef::new("name").string().not_null())
//!                 .to_owned(),
//!         )
//!     }
//!
//!     fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
//!         manager.drop_table(Table::drop().table("suppliers").to_owned())
//!     }
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod lock;
pub mod migration;
pub mod migrator;
pub mod record;
pub mod recording;
pub mod schema;
pub mod schema_manager;
pub mod startup;
pub mod state_table;
pub mod status;

pub use checksum::{migration_checksum, validate_checksum};
pub use error::MigrationError;
pub use lock::{is_migration_lock_held, MigrationLockGuard};
pub use migration::Migration;
pub use migrator::Migrator;
pub use record::MigrationRecord;
pub use recording::RecordingExecutor;
pub use schema_manager::SchemaManager;
pub use startup::startup_migrations;
pub use state_table::{initialize_state_table, STATE_TABLE};
pub use status::{MigrationStatus, PendingMigration};
