//! Property records: create, edit, delete, look up, scan.

use super::{observe, optional_text, required_text};
use crate::access::{Actor, Permission};
use crate::codes;
use crate::config::ImportConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{
    Location, NewProperty, Property, PropertyChanges, PropertyFilter, PropertyType, User,
};
use crate::store::{Store, StoreError};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

pub(crate) const NAME_MAX: usize = 200;
pub(crate) const DESCRIPTION_MAX: usize = 1000;
pub(crate) const INVENTORY_NUMBER_MAX: usize = 50;

/// A scanned property with who holds it and where it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub property: Property,
    pub current_user: Option<User>,
    pub location: Option<Location>,
    pub property_type: Option<PropertyType>,
}

pub struct PropertyRegistry<'a, S: Store> {
    pub(super) store: &'a S,
    pub(super) import: ImportConfig,
}

impl<'a, S: Store> PropertyRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_import_config(store, ImportConfig::default())
    }

    pub fn with_import_config(store: &'a S, import: ImportConfig) -> Self {
        Self { store, import }
    }

    pub fn create(&self, actor: &Actor, input: NewProperty) -> WorkflowResult<Property> {
        observe("property.created", || {
            actor.require(Permission::ManageProperties)?;
            let input = validate_new(self.store, input)?;
            let property = self.store.atomically(|s| {
                if s.inventory_number_exists(&input.inventory_number)? {
                    return Err(duplicate(&input.inventory_number));
                }
                let property = build_property(input);
                match s.insert_property(&property) {
                    Ok(()) => Ok(property),
                    // lost a race with a concurrent create
                    Err(StoreError::Conflict(_)) => Err(duplicate(&property.inventory_number)),
                    Err(e) => Err(e.into()),
                }
            })?;
            log::info!("property {} registered", property.inventory_number);
            Ok(property)
        })
    }

    /// Edit everything but the inventory number and the stored codes.
    pub fn update(
        &self,
        actor: &Actor,
        property_id: Uuid,
        changes: PropertyChanges,
    ) -> WorkflowResult<Property> {
        observe("property.updated", || {
            actor.require(Permission::ManageProperties)?;
            let existing = self.get(actor, property_id)?;
            let name = required_text("Name", &changes.name, NAME_MAX)?;
            let description =
                optional_text("Description", changes.description.as_deref(), DESCRIPTION_MAX)?;
            check_references(self.store, changes.property_type_id, changes.location_id, None)?;
            check_amounts(changes.cost, changes.usage_period_months)?;

            let updated = Property {
                name,
                description,
                property_type_id: changes.property_type_id,
                location_id: changes.location_id,
                cost: changes.cost,
                balance_date: changes.balance_date,
                usage_period_months: changes.usage_period_months,
                last_maintenance_date: changes.last_maintenance_date,
                expiry_date: changes.expiry_date,
                ..existing
            };
            self.store.atomically(|s| {
                if s.update_property(&updated)? {
                    Ok(())
                } else {
                    Err(WorkflowError::not_found("Property"))
                }
            })?;
            log::info!("property {} updated", updated.inventory_number);
            Ok(updated)
        })
    }

    /// Refused while the property is part of an open audit. Transfer history
    /// is kept.
    pub fn delete(&self, actor: &Actor, property_id: Uuid) -> WorkflowResult<()> {
        observe("property.deleted", || {
            actor.require(Permission::DeleteProperties)?;
            self.store.atomically(|s| {
                let property = s
                    .property(property_id)?
                    .ok_or_else(|| WorkflowError::not_found("Property"))?;
                if s.open_audit_items_for_property(property.id)? > 0 {
                    return Err(WorkflowError::validation(format!(
                        "Property {} is part of an audit in progress",
                        property.inventory_number
                    )));
                }
                s.delete_property(property.id)?;
                log::info!("property {} deleted", property.inventory_number);
                Ok(())
            })
        })
    }

    pub fn get(&self, actor: &Actor, property_id: Uuid) -> WorkflowResult<Property> {
        actor.require(Permission::ScanProperties)?;
        self.store
            .property(property_id)?
            .ok_or_else(|| WorkflowError::not_found("Property"))
    }

    /// Managers and admins see everything; users see what they hold.
    pub fn list(&self, actor: &Actor, filter: PropertyFilter) -> WorkflowResult<Vec<Property>> {
        actor.require(Permission::ScanProperties)?;
        let filter = if actor.can(Permission::ManageProperties) {
            filter
        } else {
            PropertyFilter {
                assigned_user_id: Some(actor.id()),
                ..filter
            }
        };
        Ok(self.store.properties(&filter)?)
    }

    /// Resolve a scanned QR payload or typed inventory number.
    pub fn scan(&self, actor: &Actor, code: &str) -> WorkflowResult<ScanResult> {
        actor.require(Permission::ScanProperties)?;
        let code = code.trim();
        let property = self
            .store
            .property_by_code(code)?
            .ok_or_else(|| WorkflowError::NotFound(format!("No property matches code {code}")))?;
        let current_user = match property.assigned_user_id {
            Some(id) => self.store.user(id)?,
            None => None,
        };
        Ok(ScanResult {
            location: self.store.location(property.location_id)?,
            property_type: self.store.property_type(property.property_type_id)?,
            current_user,
            property,
        })
    }
}

pub(crate) fn duplicate(inventory_number: &str) -> WorkflowError {
    WorkflowError::validation(format!(
        "Inventory number {inventory_number} is already in use"
    ))
}

/// Field, reference and amount checks shared by the form and the import
/// sheet. Uniqueness is checked by the caller. Returns the input trimmed.
pub(crate) fn validate_new<S: Store>(store: &S, input: NewProperty) -> WorkflowResult<NewProperty> {
    let name = required_text("Name", &input.name, NAME_MAX)?;
    let description = optional_text("Description", input.description.as_deref(), DESCRIPTION_MAX)?;
    let inventory_number =
        required_text("Inventory number", &input.inventory_number, INVENTORY_NUMBER_MAX)?;
    check_references(store, input.property_type_id, input.location_id, input.assigned_user_id)?;
    check_amounts(input.cost, input.usage_period_months)?;
    Ok(NewProperty {
        name,
        description,
        inventory_number,
        ..input
    })
}

fn check_references<S: Store>(
    store: &S,
    property_type_id: Uuid,
    location_id: Uuid,
    assigned_user_id: Option<Uuid>,
) -> WorkflowResult<()> {
    if store.property_type(property_type_id)?.is_none() {
        return Err(WorkflowError::validation("Unknown property type"));
    }
    if store.location(location_id)?.is_none() {
        return Err(WorkflowError::validation("Unknown location"));
    }
    if let Some(user_id) = assigned_user_id {
        if store.user(user_id)?.is_none() {
            return Err(WorkflowError::validation("Unknown assigned user"));
        }
    }
    Ok(())
}

fn check_amounts(cost: Option<Decimal>, usage_period_months: Option<i32>) -> WorkflowResult<()> {
    if cost.is_some_and(|c| c < Decimal::ZERO) {
        return Err(WorkflowError::validation("Cost cannot be negative"));
    }
    if usage_period_months.is_some_and(|m| m < 0) {
        return Err(WorkflowError::validation("Usage period cannot be negative"));
    }
    Ok(())
}

/// New property with generated id and codes.
pub(crate) fn build_property(input: NewProperty) -> Property {
    Property {
        id: Uuid::new_v4(),
        qr_code: codes::qr_payload(&input.inventory_number),
        barcode: codes::barcode_payload(&input.inventory_number),
        name: input.name,
        description: input.description,
        property_type_id: input.property_type_id,
        location_id: input.location_id,
        assigned_user_id: input.assigned_user_id,
        inventory_number: input.inventory_number,
        cost: input.cost,
        balance_date: input.balance_date,
        usage_period_months: input.usage_period_months,
        last_maintenance_date: input.last_maintenance_date,
        expiry_date: input.expiry_date,
        is_checked_in_last_inventory: false,
        last_inventory_check_date: None,
        created_at: Utc::now(),
    }
}
