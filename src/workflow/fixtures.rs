//! Seeded in-memory store shared by the workflow tests.

use super::registry::build_property;
use crate::access::Actor;
use crate::model::{Location, NewProperty, Property, PropertyType, Role, User};
use crate::store::{MemoryStore, Store};
use uuid::Uuid;

/// Admin at the warehouse; manager and user at the office.
pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub admin: Actor,
    pub manager: Actor,
    pub user: Actor,
    pub warehouse: Location,
    pub office: Location,
    pub property_type: PropertyType,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let warehouse = Location::new("Warehouse");
        let office = Location::new("Office");
        let property_type = PropertyType::new("Computers");
        store.insert_location(&warehouse).unwrap();
        store.insert_location(&office).unwrap();
        store.insert_property_type(&property_type).unwrap();

        let admin = User::new("admin", "Ada Admin", Role::Admin).at_location(warehouse.id);
        let manager = User::new("manager", "Max Manager", Role::Manager).at_location(office.id);
        let user = User::new("user", "Uma User", Role::User).at_location(office.id);
        for u in [&admin, &manager, &user] {
            store.insert_user(u).unwrap();
        }

        Self {
            store,
            admin: Actor::new(admin),
            manager: Actor::new(manager),
            user: Actor::new(user),
            warehouse,
            office,
            property_type,
        }
    }

    /// Unassigned property stored directly, bypassing the registry.
    pub fn property(&self, inventory_number: &str, location_id: Uuid) -> Property {
        let property = build_property(NewProperty {
            name: format!("Item {inventory_number}"),
            inventory_number: inventory_number.to_string(),
            property_type_id: self.property_type.id,
            location_id,
            ..NewProperty::default()
        });
        self.store.insert_property(&property).unwrap();
        property
    }

    pub fn user_without_location(&self, username: &str) -> User {
        let user = User::new(username, username, Role::User);
        self.store.insert_user(&user).unwrap();
        user
    }
}
