//! Persistence seam for the workflows.
//!
//! [`Store`] is the unit-of-work interface the workflows are written against.
//! [`PgStore`] implements it over any [`DbExecutor`](crate::DbExecutor);
//! [`MemoryStore`] keeps everything in process and backs the test-suite and
//! the `--in-memory` server mode.
//!
//! Multi-step writes go through [`Store::atomically`]: either every write in
//! the closure persists or none does. Calls to `atomically` must not nest.

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use pool::{PgPool, PoolError, PooledConnection};
pub use postgres::PgStore;

use crate::executor::DbError;
use crate::model::{
    Inventory, InventoryItem, Location, MaintenanceRequest, Property, PropertyFilter,
    PropertyTransfer, PropertyType, User,
};
use crate::transaction::TransactionError;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Store error type
#[derive(Debug)]
pub enum StoreError {
    /// Statement or decoding failure in the database layer
    Database(DbError),
    /// No connection could be obtained
    Unavailable(String),
    /// Unique key violated
    Conflict(String),
    /// Failure injected through [`MemoryStore::fail_next`]
    Injected(FailPoint),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {e}"),
            StoreError::Unavailable(s) => write!(f, "Store unavailable: {s}"),
            StoreError::Conflict(s) => write!(f, "Conflict: {s}"),
            StoreError::Injected(point) => write!(f, "Injected failure at {point:?}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        StoreError::Database(err)
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait Store {
    /// Run `f` as one unit of work, rolling back every write it made when it
    /// returns an error.
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StoreError>;

    // reference data
    fn insert_user(&self, user: &User) -> StoreResult<()>;
    fn user(&self, id: Uuid) -> StoreResult<Option<User>>;
    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Ordered by username.
    fn users(&self) -> StoreResult<Vec<User>>;
    fn insert_location(&self, location: &Location) -> StoreResult<()>;
    fn location(&self, id: Uuid) -> StoreResult<Option<Location>>;
    fn location_by_name(&self, name: &str) -> StoreResult<Option<Location>>;
    /// Ordered by name.
    fn locations(&self) -> StoreResult<Vec<Location>>;
    fn insert_property_type(&self, property_type: &PropertyType) -> StoreResult<()>;
    fn property_type(&self, id: Uuid) -> StoreResult<Option<PropertyType>>;
    fn property_type_by_name(&self, name: &str) -> StoreResult<Option<PropertyType>>;
    /// Ordered by name.
    fn property_types(&self) -> StoreResult<Vec<PropertyType>>;

    // properties
    fn insert_property(&self, property: &Property) -> StoreResult<()>;
    fn insert_properties(&self, properties: &[Property]) -> StoreResult<()> {
        properties.iter().try_for_each(|p| self.insert_property(p))
    }
    fn property(&self, id: Uuid) -> StoreResult<Option<Property>>;
    /// Lookup by QR payload or inventory number.
    fn property_by_code(&self, code: &str) -> StoreResult<Option<Property>>;
    fn inventory_number_exists(&self, inventory_number: &str) -> StoreResult<bool>;
    /// Ordered by inventory number.
    fn properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>>;
    fn update_property(&self, property: &Property) -> StoreResult<bool>;
    /// Removes the property together with its audit items and maintenance
    /// requests. Transfer history is kept.
    fn delete_property(&self, id: Uuid) -> StoreResult<bool>;
    /// Clears the last-inventory marks of the given properties.
    fn reset_inventory_marks(&self, property_ids: &[Uuid]) -> StoreResult<u64>;
    fn set_inventory_mark(
        &self,
        property_id: Uuid,
        checked: bool,
        at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    // audits
    fn insert_inventory(&self, inventory: &Inventory) -> StoreResult<()>;
    fn inventory(&self, id: Uuid) -> StoreResult<Option<Inventory>>;
    /// Reads the audit and holds it against other units of work until the
    /// current one ends. Call inside [`Store::atomically`].
    fn lock_inventory(&self, id: Uuid) -> StoreResult<Option<Inventory>>;
    /// Newest first.
    fn inventories(&self) -> StoreResult<Vec<Inventory>>;
    fn set_checked_items(&self, inventory_id: Uuid, checked_items: i32) -> StoreResult<()>;
    /// Marks the audit completed unless it already is; returns whether this call completed it.
    fn complete_inventory(&self, inventory_id: Uuid, end_date: DateTime<Utc>) -> StoreResult<bool>;
    /// Removes the audit and its items.
    fn delete_inventory(&self, inventory_id: Uuid) -> StoreResult<bool>;
    fn insert_inventory_items(&self, items: &[InventoryItem]) -> StoreResult<()>;
    fn inventory_item(
        &self,
        inventory_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<InventoryItem>>;
    fn inventory_items(&self, inventory_id: Uuid) -> StoreResult<Vec<InventoryItem>>;
    /// Marks the item checked unless it already is; returns whether this call checked it.
    fn check_inventory_item(&self, item_id: Uuid, at: DateTime<Utc>, by: Uuid) -> StoreResult<bool>;
    fn count_checked_items(&self, inventory_id: Uuid) -> StoreResult<i64>;
    /// Items referencing the property in audits that are not completed.
    fn open_audit_items_for_property(&self, property_id: Uuid) -> StoreResult<i64>;

    // transfers
    fn insert_transfer(&self, transfer: &PropertyTransfer) -> StoreResult<()>;
    /// Oldest first.
    fn transfers_for_property(&self, property_id: Uuid) -> StoreResult<Vec<PropertyTransfer>>;

    // maintenance
    fn insert_maintenance_request(&self, request: &MaintenanceRequest) -> StoreResult<()>;
    fn maintenance_request(&self, id: Uuid) -> StoreResult<Option<MaintenanceRequest>>;
    fn update_maintenance_request(&self, request: &MaintenanceRequest) -> StoreResult<bool>;
    /// Newest first.
    fn maintenance_requests(&self) -> StoreResult<Vec<MaintenanceRequest>>;
}

/// Hands out a store per request.
pub trait StoreProvider: Send + Sync + 'static {
    type Store: Store;

    fn acquire(&self) -> StoreResult<Self::Store>;
}
