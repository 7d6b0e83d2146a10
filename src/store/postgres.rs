//! [`Store`] over PostgreSQL.

use super::{Store, StoreError, StoreResult};
use crate::executor::{DbError, DbExecutor};
use crate::model::{
    AuditScope, Inventory, InventoryItem, Location, MaintenanceRequest, Property, PropertyFilter,
    PropertyTransfer, PropertyType, User,
};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use may_postgres::error::SqlState;
use may_postgres::Row;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, full_name, role, location_id";
const PROPERTY_COLUMNS: &str = "id, name, description, property_type_id, location_id, \
    assigned_user_id, inventory_number, qr_code, barcode, cost, balance_date, \
    usage_period_months, last_maintenance_date, expiry_date, is_checked_in_last_inventory, \
    last_inventory_check_date, created_at";
const INVENTORY_COLUMNS: &str = "id, name, scope_kind, scope_user_id, location_id, start_date, \
    end_date, is_completed, total_items, checked_items";
const ITEM_COLUMNS: &str = "id, inventory_id, property_id, is_checked, check_date, checked_by_id";
const TRANSFER_COLUMNS: &str = "id, property_id, from_user_id, to_user_id, transfer_date, notes";
const MAINTENANCE_COLUMNS: &str = "id, property_id, requested_by_id, assigned_to_user_id, status, \
    description, request_date, assigned_date, completion_date, resolution_notes";

pub struct PgStore<E: DbExecutor> {
    executor: E,
}

impl<E: DbExecutor> PgStore<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn one<T>(
        &self,
        sql: &str,
        params: &[&dyn may_postgres::types::ToSql],
        decode: fn(&Row) -> Result<T, DbError>,
    ) -> StoreResult<Option<T>> {
        match self.executor.query_opt(sql, params)? {
            Some(row) => Ok(Some(decode(&row)?)),
            None => Ok(None),
        }
    }

    fn many<T>(
        &self,
        sql: &str,
        params: &[&dyn may_postgres::types::ToSql],
        decode: fn(&Row) -> Result<T, DbError>,
    ) -> StoreResult<Vec<T>> {
        let rows = self.executor.query_all(sql, params)?;
        rows.iter()
            .map(|row| decode(row).map_err(StoreError::from))
            .collect()
    }

    fn count(&self, sql: &str, params: &[&dyn may_postgres::types::ToSql]) -> StoreResult<i64> {
        let row = self.executor.query_one(sql, params)?;
        row.try_get::<usize, i64>(0)
            .map_err(|e| StoreError::Database(DbError::ParseError(format!("count: {e}"))))
    }
}

/// Unique-index violations become [`StoreError::Conflict`].
fn unique_conflict(err: DbError, describe: impl FnOnce() -> String) -> StoreError {
    match &err {
        DbError::PostgresError(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
            StoreError::Conflict(describe())
        }
        _ => StoreError::Database(err),
    }
}

fn scope_columns(scope: &AuditScope) -> (&'static str, Option<Uuid>) {
    match scope {
        AuditScope::Location(_) => ("location", None),
        AuditScope::User(user_id) => ("user", Some(*user_id)),
    }
}

impl<E: DbExecutor> Store for PgStore<E> {
    fn atomically<T, Fail, F>(&self, f: F) -> Result<T, Fail>
    where
        F: FnOnce(&Self) -> Result<T, Fail>,
        Fail: From<StoreError>,
    {
        let tx = Transaction::begin(&self.executor).map_err(StoreError::from)?;
        match f(self) {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback() {
                    log::error!("rollback failed: {rollback_error}");
                }
                Err(e)
            }
        }
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.executor.execute(
            "INSERT INTO users (id, username, full_name, role, location_id) VALUES ($1, $2, $3, $4, $5)",
            &[&user.id, &user.username, &user.full_name, &user.role.as_str(), &user.location_id],
        )?;
        Ok(())
    }

    fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.one(&sql, &[&id], User::from_row)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        self.one(&sql, &[&username], User::from_row)
    }

    fn users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        self.many(&sql, &[], User::from_row)
    }

    fn insert_location(&self, location: &Location) -> StoreResult<()> {
        self.executor.execute(
            "INSERT INTO locations (id, name, description) VALUES ($1, $2, $3)",
            &[&location.id, &location.name, &location.description],
        )?;
        Ok(())
    }

    fn location(&self, id: Uuid) -> StoreResult<Option<Location>> {
        self.one(
            "SELECT id, name, description FROM locations WHERE id = $1",
            &[&id],
            Location::from_row,
        )
    }

    fn location_by_name(&self, name: &str) -> StoreResult<Option<Location>> {
        self.one(
            "SELECT id, name, description FROM locations WHERE name = $1",
            &[&name],
            Location::from_row,
        )
    }

    fn locations(&self) -> StoreResult<Vec<Location>> {
        self.many(
            "SELECT id, name, description FROM locations ORDER BY name",
            &[],
            Location::from_row,
        )
    }

    fn insert_property_type(&self, property_type: &PropertyType) -> StoreResult<()> {
        self.executor.execute(
            "INSERT INTO property_types (id, name, description) VALUES ($1, $2, $3)",
            &[&property_type.id, &property_type.name, &property_type.description],
        )?;
        Ok(())
    }

    fn property_type(&self, id: Uuid) -> StoreResult<Option<PropertyType>> {
        self.one(
            "SELECT id, name, description FROM property_types WHERE id = $1",
            &[&id],
            PropertyType::from_row,
        )
    }

    fn property_type_by_name(&self, name: &str) -> StoreResult<Option<PropertyType>> {
        self.one(
            "SELECT id, name, description FROM property_types WHERE name = $1",
            &[&name],
            PropertyType::from_row,
        )
    }

    fn property_types(&self) -> StoreResult<Vec<PropertyType>> {
        self.many(
            "SELECT id, name, description FROM property_types ORDER BY name",
            &[],
            PropertyType::from_row,
        )
    }

    fn insert_property(&self, p: &Property) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO properties ({PROPERTY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        );
        self.executor.execute(
            &sql,
            &[
                &p.id,
                &p.name,
                &p.description,
                &p.property_type_id,
                &p.location_id,
                &p.assigned_user_id,
                &p.inventory_number,
                &p.qr_code,
                &p.barcode,
                &p.cost,
                &p.balance_date,
                &p.usage_period_months,
                &p.last_maintenance_date,
                &p.expiry_date,
                &p.is_checked_in_last_inventory,
                &p.last_inventory_check_date,
                &p.created_at,
            ],
        )
        .map_err(|e| {
            unique_conflict(e, || format!("inventory number `{}` exists", p.inventory_number))
        })?;
        Ok(())
    }

    fn property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1");
        self.one(&sql, &[&id], Property::from_row)
    }

    fn property_by_code(&self, code: &str) -> StoreResult<Option<Property>> {
        // a QR payload match wins over an inventory number that happens to equal it
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE qr_code = $1 OR inventory_number = $1 \
             ORDER BY (qr_code = $1) DESC LIMIT 1"
        );
        self.one(&sql, &[&code], Property::from_row)
    }

    fn inventory_number_exists(&self, inventory_number: &str) -> StoreResult<bool> {
        let n = self.count(
            "SELECT COUNT(*) FROM properties WHERE inventory_number = $1",
            &[&inventory_number],
        )?;
        Ok(n > 0)
    }

    fn properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE ($1::uuid IS NULL OR location_id = $1) \
               AND ($2::uuid IS NULL OR assigned_user_id = $2) \
             ORDER BY inventory_number"
        );
        self.many(
            &sql,
            &[&filter.location_id, &filter.assigned_user_id],
            Property::from_row,
        )
    }

    fn update_property(&self, p: &Property) -> StoreResult<bool> {
        let rows = self.executor.execute(
            "UPDATE properties SET name = $2, description = $3, property_type_id = $4, \
             location_id = $5, assigned_user_id = $6, cost = $7, balance_date = $8, \
             usage_period_months = $9, last_maintenance_date = $10, expiry_date = $11, \
             is_checked_in_last_inventory = $12, last_inventory_check_date = $13 \
             WHERE id = $1",
            &[
                &p.id,
                &p.name,
                &p.description,
                &p.property_type_id,
                &p.location_id,
                &p.assigned_user_id,
                &p.cost,
                &p.balance_date,
                &p.usage_period_months,
                &p.last_maintenance_date,
                &p.expiry_date,
                &p.is_checked_in_last_inventory,
                &p.last_inventory_check_date,
            ],
        )?;
        Ok(rows == 1)
    }

    fn delete_property(&self, id: Uuid) -> StoreResult<bool> {
        self.executor
            .execute("DELETE FROM inventory_items WHERE property_id = $1", &[&id])?;
        self.executor
            .execute("DELETE FROM maintenance_requests WHERE property_id = $1", &[&id])?;
        let rows = self
            .executor
            .execute("DELETE FROM properties WHERE id = $1", &[&id])?;
        Ok(rows == 1)
    }

    fn reset_inventory_marks(&self, property_ids: &[Uuid]) -> StoreResult<u64> {
        if property_ids.is_empty() {
            return Ok(0);
        }
        let rows = self.executor.execute(
            "UPDATE properties SET is_checked_in_last_inventory = FALSE, \
             last_inventory_check_date = NULL WHERE id = ANY($1)",
            &[&property_ids],
        )?;
        Ok(rows)
    }

    fn set_inventory_mark(
        &self,
        property_id: Uuid,
        checked: bool,
        at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        self.executor.execute(
            "UPDATE properties SET is_checked_in_last_inventory = $2, \
             last_inventory_check_date = $3 WHERE id = $1",
            &[&property_id, &checked, &at],
        )?;
        Ok(())
    }

    fn insert_inventory(&self, inventory: &Inventory) -> StoreResult<()> {
        let (scope_kind, scope_user_id) = scope_columns(&inventory.scope);
        let sql = format!(
            "INSERT INTO inventories ({INVENTORY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        self.executor.execute(
            &sql,
            &[
                &inventory.id,
                &inventory.name,
                &scope_kind,
                &scope_user_id,
                &inventory.location_id,
                &inventory.start_date,
                &inventory.end_date,
                &inventory.is_completed,
                &inventory.total_items,
                &inventory.checked_items,
            ],
        )?;
        Ok(())
    }

    fn inventory(&self, id: Uuid) -> StoreResult<Option<Inventory>> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventories WHERE id = $1");
        self.one(&sql, &[&id], Inventory::from_row)
    }

    fn lock_inventory(&self, id: Uuid) -> StoreResult<Option<Inventory>> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventories WHERE id = $1 FOR UPDATE");
        self.one(&sql, &[&id], Inventory::from_row)
    }

    fn inventories(&self) -> StoreResult<Vec<Inventory>> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventories ORDER BY start_date DESC");
        self.many(&sql, &[], Inventory::from_row)
    }

    fn set_checked_items(&self, inventory_id: Uuid, checked_items: i32) -> StoreResult<()> {
        self.executor.execute(
            "UPDATE inventories SET checked_items = $2 WHERE id = $1",
            &[&inventory_id, &checked_items],
        )?;
        Ok(())
    }

    fn complete_inventory(&self, inventory_id: Uuid, end_date: DateTime<Utc>) -> StoreResult<bool> {
        let rows = self.executor.execute(
            "UPDATE inventories SET is_completed = TRUE, end_date = $2 \
             WHERE id = $1 AND is_completed = FALSE",
            &[&inventory_id, &end_date],
        )?;
        Ok(rows == 1)
    }

    fn delete_inventory(&self, inventory_id: Uuid) -> StoreResult<bool> {
        self.executor.execute(
            "DELETE FROM inventory_items WHERE inventory_id = $1",
            &[&inventory_id],
        )?;
        let rows = self
            .executor
            .execute("DELETE FROM inventories WHERE id = $1", &[&inventory_id])?;
        Ok(rows == 1)
    }

    fn insert_inventory_items(&self, items: &[InventoryItem]) -> StoreResult<()> {
        let sql =
            format!("INSERT INTO inventory_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
        for item in items {
            self.executor.execute(
                &sql,
                &[
                    &item.id,
                    &item.inventory_id,
                    &item.property_id,
                    &item.is_checked,
                    &item.check_date,
                    &item.checked_by_id,
                ],
            )?;
        }
        Ok(())
    }

    fn inventory_item(
        &self,
        inventory_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<InventoryItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE inventory_id = $1 AND property_id = $2"
        );
        self.one(&sql, &[&inventory_id, &property_id], InventoryItem::from_row)
    }

    fn inventory_items(&self, inventory_id: Uuid) -> StoreResult<Vec<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE inventory_id = $1");
        self.many(&sql, &[&inventory_id], InventoryItem::from_row)
    }

    fn check_inventory_item(
        &self,
        item_id: Uuid,
        at: DateTime<Utc>,
        by: Uuid,
    ) -> StoreResult<bool> {
        let rows = self.executor.execute(
            "UPDATE inventory_items SET is_checked = TRUE, check_date = $2, checked_by_id = $3 \
             WHERE id = $1 AND is_checked = FALSE",
            &[&item_id, &at, &by],
        )?;
        Ok(rows == 1)
    }

    fn count_checked_items(&self, inventory_id: Uuid) -> StoreResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM inventory_items WHERE inventory_id = $1 AND is_checked",
            &[&inventory_id],
        )
    }

    fn open_audit_items_for_property(&self, property_id: Uuid) -> StoreResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM inventory_items i \
             JOIN inventories v ON v.id = i.inventory_id \
             WHERE i.property_id = $1 AND NOT v.is_completed",
            &[&property_id],
        )
    }

    fn insert_transfer(&self, t: &PropertyTransfer) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO property_transfers ({TRANSFER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        );
        self.executor.execute(
            &sql,
            &[
                &t.id,
                &t.property_id,
                &t.from_user_id,
                &t.to_user_id,
                &t.transfer_date,
                &t.notes,
            ],
        )?;
        Ok(())
    }

    fn transfers_for_property(&self, property_id: Uuid) -> StoreResult<Vec<PropertyTransfer>> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM property_transfers WHERE property_id = $1 ORDER BY transfer_date"
        );
        self.many(&sql, &[&property_id], PropertyTransfer::from_row)
    }

    fn insert_maintenance_request(&self, r: &MaintenanceRequest) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO maintenance_requests ({MAINTENANCE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        self.executor.execute(
            &sql,
            &[
                &r.id,
                &r.property_id,
                &r.requested_by_id,
                &r.assigned_to_user_id,
                &r.status.as_str(),
                &r.description,
                &r.request_date,
                &r.assigned_date,
                &r.completion_date,
                &r.resolution_notes,
            ],
        )?;
        Ok(())
    }

    fn maintenance_request(&self, id: Uuid) -> StoreResult<Option<MaintenanceRequest>> {
        let sql = format!("SELECT {MAINTENANCE_COLUMNS} FROM maintenance_requests WHERE id = $1");
        self.one(&sql, &[&id], MaintenanceRequest::from_row)
    }

    fn update_maintenance_request(&self, r: &MaintenanceRequest) -> StoreResult<bool> {
        let rows = self.executor.execute(
            "UPDATE maintenance_requests SET assigned_to_user_id = $2, status = $3, \
             assigned_date = $4, completion_date = $5, resolution_notes = $6 WHERE id = $1",
            &[
                &r.id,
                &r.assigned_to_user_id,
                &r.status.as_str(),
                &r.assigned_date,
                &r.completion_date,
                &r.resolution_notes,
            ],
        )?;
        Ok(rows == 1)
    }

    fn maintenance_requests(&self) -> StoreResult<Vec<MaintenanceRequest>> {
        let sql = format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_requests ORDER BY request_date DESC"
        );
        self.many(&sql, &[], MaintenanceRequest::from_row)
    }
}
