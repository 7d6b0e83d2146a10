//! In-process [`Store`].
//!
//! Clones share state. `atomically` serialises units of work behind a gate
//! and restores a snapshot when the closure fails, so rollback behaves like
//! the PostgreSQL store. [`MemoryStore::fail_next`] arms a one-shot failure
//! at a chosen write ([`MemoryStore::fail_after`] after a number of
//! successful ones), which is how the rollback paths are exercised.

use super::{Store, StoreError, StoreProvider, StoreResult};
use crate::model::{
    Inventory, InventoryItem, Location, MaintenanceRequest, Property, PropertyFilter,
    PropertyTransfer, PropertyType, User,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Writes that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertProperty,
    UpdateProperty,
    InsertInventory,
    InsertInventoryItems,
    CheckInventoryItem,
    InsertTransfer,
    UpdateMaintenanceRequest,
}

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<Uuid, User>,
    locations: HashMap<Uuid, Location>,
    property_types: HashMap<Uuid, PropertyType>,
    properties: HashMap<Uuid, Property>,
    inventories: HashMap<Uuid, Inventory>,
    items: HashMap<Uuid, InventoryItem>,
    transfers: Vec<PropertyTransfer>,
    maintenance: HashMap<Uuid, MaintenanceRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    gate: Arc<Mutex<()>>,
    /// Armed point and how many matching writes still succeed first.
    fail_next: Arc<Mutex<Option<(FailPoint, usize)>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write at `point` fail with [`StoreError::Injected`].
    pub fn fail_next(&self, point: FailPoint) {
        self.fail_after(point, 0);
    }

    /// Let `successes` writes at `point` through, then fail the one after.
    pub fn fail_after(&self, point: FailPoint, successes: usize) {
        *lock(&self.fail_next) = Some((point, successes));
    }

    fn trip(&self, point: FailPoint) -> StoreResult<()> {
        let mut armed = lock(&self.fail_next);
        let Some((armed_point, successes)) = *armed else {
            return Ok(());
        };
        if armed_point != point {
            return Ok(());
        }
        if successes == 0 {
            *armed = None;
            return Err(StoreError::Injected(point));
        }
        *armed = Some((point, successes - 1));
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    pub fn property_count(&self) -> usize {
        self.state().properties.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.state().transfers.len()
    }
}

impl StoreProvider for MemoryStore {
    type Store = MemoryStore;

    fn acquire(&self) -> StoreResult<Self::Store> {
        Ok(self.clone())
    }
}

impl Store for MemoryStore {
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _gate = lock(&self.gate);
        let snapshot = self.state().clone();
        let result = f(self);
        if result.is_err() {
            *self.state() = snapshot;
        }
        result
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state();
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username `{}` is taken", user.username)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state().users.get(&id).cloned())
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.state().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    fn insert_location(&self, location: &Location) -> StoreResult<()> {
        let mut state = self.state();
        if state.locations.values().any(|l| l.name == location.name) {
            return Err(StoreError::Conflict(format!("location `{}` exists", location.name)));
        }
        state.locations.insert(location.id, location.clone());
        Ok(())
    }

    fn location(&self, id: Uuid) -> StoreResult<Option<Location>> {
        Ok(self.state().locations.get(&id).cloned())
    }

    fn location_by_name(&self, name: &str) -> StoreResult<Option<Location>> {
        Ok(self
            .state()
            .locations
            .values()
            .find(|l| l.name == name)
            .cloned())
    }

    fn locations(&self) -> StoreResult<Vec<Location>> {
        let mut locations: Vec<Location> = self.state().locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    fn insert_property_type(&self, property_type: &PropertyType) -> StoreResult<()> {
        let mut state = self.state();
        if state.property_types.values().any(|t| t.name == property_type.name) {
            return Err(StoreError::Conflict(format!(
                "property type `{}` exists",
                property_type.name
            )));
        }
        state.property_types.insert(property_type.id, property_type.clone());
        Ok(())
    }

    fn property_type(&self, id: Uuid) -> StoreResult<Option<PropertyType>> {
        Ok(self.state().property_types.get(&id).cloned())
    }

    fn property_type_by_name(&self, name: &str) -> StoreResult<Option<PropertyType>> {
        Ok(self
            .state()
            .property_types
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    fn property_types(&self) -> StoreResult<Vec<PropertyType>> {
        let mut types: Vec<PropertyType> = self.state().property_types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    fn insert_property(&self, property: &Property) -> StoreResult<()> {
        self.trip(FailPoint::InsertProperty)?;
        let mut state = self.state();
        if state
            .properties
            .values()
            .any(|p| p.inventory_number == property.inventory_number)
        {
            return Err(StoreError::Conflict(format!(
                "inventory number `{}` exists",
                property.inventory_number
            )));
        }
        state.properties.insert(property.id, property.clone());
        Ok(())
    }

    fn property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.state().properties.get(&id).cloned())
    }

    fn property_by_code(&self, code: &str) -> StoreResult<Option<Property>> {
        let state = self.state();
        let by_qr = state.properties.values().find(|p| p.qr_code == code);
        Ok(by_qr
            .or_else(|| state.properties.values().find(|p| p.inventory_number == code))
            .cloned())
    }

    fn inventory_number_exists(&self, inventory_number: &str) -> StoreResult<bool> {
        Ok(self
            .state()
            .properties
            .values()
            .any(|p| p.inventory_number == inventory_number))
    }

    fn properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>> {
        let mut found: Vec<Property> = self
            .state()
            .properties
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.inventory_number.cmp(&b.inventory_number));
        Ok(found)
    }

    fn update_property(&self, property: &Property) -> StoreResult<bool> {
        self.trip(FailPoint::UpdateProperty)?;
        let mut state = self.state();
        match state.properties.get_mut(&property.id) {
            Some(existing) => {
                // identity and generated codes are immutable
                let mut updated = property.clone();
                updated.inventory_number = existing.inventory_number.clone();
                updated.qr_code = existing.qr_code.clone();
                updated.barcode = existing.barcode.clone();
                updated.created_at = existing.created_at;
                *existing = updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_property(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state();
        state.items.retain(|_, item| item.property_id != id);
        state.maintenance.retain(|_, r| r.property_id != id);
        Ok(state.properties.remove(&id).is_some())
    }

    fn reset_inventory_marks(&self, property_ids: &[Uuid]) -> StoreResult<u64> {
        let mut state = self.state();
        let mut reset = 0;
        for id in property_ids {
            if let Some(p) = state.properties.get_mut(id) {
                p.is_checked_in_last_inventory = false;
                p.last_inventory_check_date = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    fn set_inventory_mark(
        &self,
        property_id: Uuid,
        checked: bool,
        at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        if let Some(p) = self.state().properties.get_mut(&property_id) {
            p.is_checked_in_last_inventory = checked;
            p.last_inventory_check_date = at;
        }
        Ok(())
    }

    fn insert_inventory(&self, inventory: &Inventory) -> StoreResult<()> {
        self.trip(FailPoint::InsertInventory)?;
        self.state().inventories.insert(inventory.id, inventory.clone());
        Ok(())
    }

    fn inventory(&self, id: Uuid) -> StoreResult<Option<Inventory>> {
        Ok(self.state().inventories.get(&id).cloned())
    }

    // units of work already run one at a time behind the gate
    fn lock_inventory(&self, id: Uuid) -> StoreResult<Option<Inventory>> {
        self.inventory(id)
    }

    fn inventories(&self) -> StoreResult<Vec<Inventory>> {
        let mut all: Vec<Inventory> = self.state().inventories.values().cloned().collect();
        all.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(all)
    }

    fn set_checked_items(&self, inventory_id: Uuid, checked_items: i32) -> StoreResult<()> {
        if let Some(inv) = self.state().inventories.get_mut(&inventory_id) {
            inv.checked_items = checked_items;
        }
        Ok(())
    }

    fn complete_inventory(&self, inventory_id: Uuid, end_date: DateTime<Utc>) -> StoreResult<bool> {
        match self.state().inventories.get_mut(&inventory_id) {
            Some(inv) if !inv.is_completed => {
                inv.is_completed = true;
                inv.end_date = Some(end_date);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_inventory(&self, inventory_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state();
        state.items.retain(|_, item| item.inventory_id != inventory_id);
        Ok(state.inventories.remove(&inventory_id).is_some())
    }

    fn insert_inventory_items(&self, items: &[InventoryItem]) -> StoreResult<()> {
        self.trip(FailPoint::InsertInventoryItems)?;
        let mut state = self.state();
        for item in items {
            let duplicate = state
                .items
                .values()
                .any(|i| i.inventory_id == item.inventory_id && i.property_id == item.property_id);
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "property {} already listed in audit {}",
                    item.property_id, item.inventory_id
                )));
            }
            state.items.insert(item.id, item.clone());
        }
        Ok(())
    }

    fn inventory_item(
        &self,
        inventory_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<InventoryItem>> {
        Ok(self
            .state()
            .items
            .values()
            .find(|i| i.inventory_id == inventory_id && i.property_id == property_id)
            .cloned())
    }

    fn inventory_items(&self, inventory_id: Uuid) -> StoreResult<Vec<InventoryItem>> {
        Ok(self
            .state()
            .items
            .values()
            .filter(|i| i.inventory_id == inventory_id)
            .cloned()
            .collect())
    }

    fn check_inventory_item(
        &self,
        item_id: Uuid,
        at: DateTime<Utc>,
        by: Uuid,
    ) -> StoreResult<bool> {
        self.trip(FailPoint::CheckInventoryItem)?;
        match self.state().items.get_mut(&item_id) {
            Some(item) if !item.is_checked => {
                item.is_checked = true;
                item.check_date = Some(at);
                item.checked_by_id = Some(by);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn count_checked_items(&self, inventory_id: Uuid) -> StoreResult<i64> {
        let n = self
            .state()
            .items
            .values()
            .filter(|i| i.inventory_id == inventory_id && i.is_checked)
            .count();
        Ok(n as i64)
    }

    fn open_audit_items_for_property(&self, property_id: Uuid) -> StoreResult<i64> {
        let state = self.state();
        let n = state
            .items
            .values()
            .filter(|i| i.property_id == property_id)
            .filter(|i| {
                state
                    .inventories
                    .get(&i.inventory_id)
                    .is_some_and(|inv| !inv.is_completed)
            })
            .count();
        Ok(n as i64)
    }

    fn insert_transfer(&self, transfer: &PropertyTransfer) -> StoreResult<()> {
        self.trip(FailPoint::InsertTransfer)?;
        self.state().transfers.push(transfer.clone());
        Ok(())
    }

    fn transfers_for_property(&self, property_id: Uuid) -> StoreResult<Vec<PropertyTransfer>> {
        let mut found: Vec<PropertyTransfer> = self
            .state()
            .transfers
            .iter()
            .filter(|t| t.property_id == property_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.transfer_date.cmp(&b.transfer_date));
        Ok(found)
    }

    fn insert_maintenance_request(&self, request: &MaintenanceRequest) -> StoreResult<()> {
        self.state().maintenance.insert(request.id, request.clone());
        Ok(())
    }

    fn maintenance_request(&self, id: Uuid) -> StoreResult<Option<MaintenanceRequest>> {
        Ok(self.state().maintenance.get(&id).cloned())
    }

    fn update_maintenance_request(&self, request: &MaintenanceRequest) -> StoreResult<bool> {
        self.trip(FailPoint::UpdateMaintenanceRequest)?;
        match self.state().maintenance.get_mut(&request.id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn maintenance_requests(&self) -> StoreResult<Vec<MaintenanceRequest>> {
        let mut all: Vec<MaintenanceRequest> = self.state().maintenance.values().cloned().collect();
        all.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        Ok(all)
    }
}
