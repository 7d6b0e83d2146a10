//! Inventory audits: snapshot a scope, check items off by scanning, close.

use super::{observe, required_text};
use crate::access::{Actor, Permission};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{AuditScope, Inventory, InventoryItem, Property, PropertyFilter};
use crate::store::Store;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

const NAME_MAX: usize = 200;

/// Result of a successful check-off.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub checked_items: i32,
    pub total_items: i32,
    pub is_completed: bool,
    pub property: Property,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLine {
    pub item: InventoryItem,
    pub property_name: String,
    pub inventory_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetail {
    pub inventory: Inventory,
    pub lines: Vec<AuditLine>,
}

pub struct AuditEngine<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> AuditEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Audit every property currently at `location_id`.
    pub fn create_for_location(
        &self,
        actor: &Actor,
        name: &str,
        location_id: Uuid,
    ) -> WorkflowResult<Inventory> {
        observe("audit.created", || {
            actor.require(Permission::ConductAudits)?;
            let name = required_text("Audit name", name, NAME_MAX)?;
            let location = self
                .store
                .location(location_id)?
                .ok_or_else(|| WorkflowError::not_found("Location"))?;

            self.store.atomically(|s| {
                let properties = s.properties(&PropertyFilter::at_location(location.id))?;
                if properties.is_empty() {
                    return Err(WorkflowError::validation(format!(
                        "There are no properties at {}",
                        location.name
                    )));
                }
                let scope = AuditScope::Location(location.id);
                let inventory = Self::snapshot(s, name, scope, location.id, &properties)?;
                log::info!(
                    "audit {} created for location {} with {} item(s)",
                    inventory.id,
                    location.name,
                    inventory.total_items
                );
                Ok(inventory)
            })
        })
    }

    /// Audit every property assigned to `user_id`. The audit takes the
    /// user's location.
    pub fn create_for_user(
        &self,
        actor: &Actor,
        name: &str,
        user_id: Uuid,
    ) -> WorkflowResult<Inventory> {
        observe("audit.created", || {
            actor.require(Permission::ConductAudits)?;
            let name = required_text("Audit name", name, NAME_MAX)?;
            let user = self
                .store
                .user(user_id)?
                .ok_or_else(|| WorkflowError::not_found("User"))?;
            let location_id = user.location_id.ok_or_else(|| {
                WorkflowError::validation(format!("{} has no location set", user.full_name))
            })?;

            self.store.atomically(|s| {
                let properties = s.properties(&PropertyFilter::assigned_to(user.id))?;
                if properties.is_empty() {
                    return Err(WorkflowError::validation(format!(
                        "{} has no assigned properties",
                        user.full_name
                    )));
                }
                let scope = AuditScope::User(user.id);
                let inventory = Self::snapshot(s, name, scope, location_id, &properties)?;
                log::info!(
                    "audit {} created for user {} with {} item(s)",
                    inventory.id,
                    user.username,
                    inventory.total_items
                );
                Ok(inventory)
            })
        })
    }

    /// Reset marks, then persist the audit and one pending item per property.
    fn snapshot(
        s: &S,
        name: String,
        scope: AuditScope,
        location_id: Uuid,
        properties: &[Property],
    ) -> WorkflowResult<Inventory> {
        let ids: Vec<Uuid> = properties.iter().map(|p| p.id).collect();
        s.reset_inventory_marks(&ids)?;

        let inventory = Inventory::new(name, scope, location_id, properties.len() as i32);
        s.insert_inventory(&inventory)?;

        let items: Vec<InventoryItem> = ids
            .iter()
            .map(|property_id| InventoryItem::pending(inventory.id, *property_id))
            .collect();
        s.insert_inventory_items(&items)?;
        Ok(inventory)
    }

    /// Check off the property identified by `code` (QR payload or inventory
    /// number). Completes the audit when the last item is checked.
    pub fn check_item(
        &self,
        actor: &Actor,
        inventory_id: Uuid,
        code: &str,
    ) -> WorkflowResult<CheckOutcome> {
        observe("audit.item_checked", || {
            actor.require(Permission::ConductAudits)?;
            let code = code.trim();
            if code.is_empty() {
                return Err(WorkflowError::validation("Scan a code first"));
            }

            self.store.atomically(|s| {
                let inventory = s
                    .lock_inventory(inventory_id)?
                    .ok_or_else(|| WorkflowError::not_found("Inventory audit"))?;
                if inventory.is_completed {
                    return Err(WorkflowError::validation(
                        "This inventory audit is already completed",
                    ));
                }
                let mut property = s.property_by_code(code)?.ok_or_else(|| {
                    WorkflowError::validation(format!("No property matches code {code}"))
                })?;
                if property.location_id != inventory.location_id {
                    return Err(WorkflowError::validation(format!(
                        "Property {} is not at this audit's location",
                        property.inventory_number
                    )));
                }
                let item = s.inventory_item(inventory.id, property.id)?.ok_or_else(|| {
                    WorkflowError::validation(format!(
                        "Property {} is not part of this audit",
                        property.inventory_number
                    ))
                })?;
                let already_checked = || {
                    WorkflowError::validation(format!(
                        "Property {} has already been checked",
                        property.inventory_number
                    ))
                };
                if item.is_checked {
                    return Err(already_checked());
                }

                let now = Utc::now();
                if !s.check_inventory_item(item.id, now, actor.id())? {
                    return Err(already_checked());
                }
                let checked_items = s.count_checked_items(inventory.id)? as i32;
                s.set_checked_items(inventory.id, checked_items)?;
                s.set_inventory_mark(property.id, true, Some(now))?;
                property.is_checked_in_last_inventory = true;
                property.last_inventory_check_date = Some(now);

                let is_completed = checked_items >= inventory.total_items;
                if is_completed && s.complete_inventory(inventory.id, now)? {
                    log::info!(
                        "audit {} completed: all {} item(s) checked",
                        inventory.id,
                        inventory.total_items
                    );
                }

                Ok(CheckOutcome {
                    checked_items,
                    total_items: inventory.total_items,
                    is_completed,
                    property,
                })
            })
        })
    }

    /// Close an audit by hand. Properties behind unchecked items are marked
    /// as not found in this inventory.
    pub fn complete(&self, actor: &Actor, inventory_id: Uuid) -> WorkflowResult<Inventory> {
        observe("audit.completed", || {
            actor.require(Permission::ConductAudits)?;
            self.store.atomically(|s| {
                let inventory = s
                    .lock_inventory(inventory_id)?
                    .ok_or_else(|| WorkflowError::not_found("Inventory audit"))?;
                let already =
                    || WorkflowError::validation("This inventory audit is already completed");
                if inventory.is_completed {
                    return Err(already());
                }

                for item in s.inventory_items(inventory.id)? {
                    if !item.is_checked {
                        s.set_inventory_mark(item.property_id, false, None)?;
                    }
                }
                let now = Utc::now();
                if !s.complete_inventory(inventory.id, now)? {
                    return Err(already());
                }
                log::info!(
                    "audit {} completed manually with {}/{} item(s) checked",
                    inventory.id,
                    inventory.checked_items,
                    inventory.total_items
                );
                Ok(Inventory {
                    is_completed: true,
                    end_date: Some(now),
                    ..inventory
                })
            })
        })
    }

    pub fn delete(&self, actor: &Actor, inventory_id: Uuid) -> WorkflowResult<()> {
        observe("audit.deleted", || {
            actor.require(Permission::DeleteAudits)?;
            self.store.atomically(|s| {
                if s.delete_inventory(inventory_id)? {
                    log::info!("audit {inventory_id} deleted");
                    Ok(())
                } else {
                    Err(WorkflowError::not_found("Inventory audit"))
                }
            })
        })
    }

    /// Delete every completed audit; returns how many were removed.
    pub fn delete_completed(&self, actor: &Actor) -> WorkflowResult<usize> {
        observe("audit.deleted", || {
            actor.require(Permission::DeleteAudits)?;
            self.store.atomically(|s| {
                let mut deleted = 0;
                for inventory in s.inventories()?.into_iter().filter(|i| i.is_completed) {
                    if s.delete_inventory(inventory.id)? {
                        deleted += 1;
                    }
                }
                log::info!("deleted {deleted} completed audit(s)");
                Ok(deleted)
            })
        })
    }

    /// Newest first.
    pub fn list(&self, actor: &Actor) -> WorkflowResult<Vec<Inventory>> {
        actor.require(Permission::ConductAudits)?;
        Ok(self.store.inventories()?)
    }

    pub fn detail(&self, actor: &Actor, inventory_id: Uuid) -> WorkflowResult<AuditDetail> {
        actor.require(Permission::ConductAudits)?;
        let inventory = self
            .store
            .inventory(inventory_id)?
            .ok_or_else(|| WorkflowError::not_found("Inventory audit"))?;

        let mut lines = Vec::new();
        for item in self.store.inventory_items(inventory.id)? {
            let (property_name, inventory_number) = match self.store.property(item.property_id)? {
                Some(p) => (p.name, p.inventory_number),
                None => (String::new(), String::new()),
            };
            lines.push(AuditLine {
                item,
                property_name,
                inventory_number,
            });
        }
        lines.sort_by(|a, b| a.inventory_number.cmp(&b.inventory_number));
        Ok(AuditDetail { inventory, lines })
    }
}
