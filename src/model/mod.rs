//! Domain records.
//!
//! Every record is a plain struct with a `from_row` constructor for the
//! PostgreSQL store; the in-memory store keeps them as-is.

pub mod inventory;
pub mod maintenance;
pub mod property;
pub mod reference;
pub mod transfer;
pub mod user;

pub use inventory::{AuditScope, Inventory, InventoryItem};
pub use maintenance::{MaintenanceRequest, MaintenanceStatus};
pub use property::{NewProperty, Property, PropertyChanges, PropertyFilter};
pub use reference::{Location, PropertyType};
pub use transfer::PropertyTransfer;
pub use user::{Role, User};

use crate::executor::DbError;
use may_postgres::types::FromSql;
use may_postgres::Row;

/// Typed column read that reports the column name on failure.
pub(crate) fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, DbError> {
    row.try_get::<&str, T>(name)
        .map_err(|e| DbError::ParseError(format!("column `{name}`: {e}")))
}
