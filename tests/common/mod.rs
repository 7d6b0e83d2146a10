//! Shared setup for the scenario tests: an in-memory store with two
//! locations, one property type and one user per role.

#![allow(dead_code)]

use fake::faker::name::raw::Name;
use fake::locales::EN;
use fake::Fake;
use quartermaster::model::{Location, NewProperty, Property, PropertyType, Role, User};
use quartermaster::workflow::PropertyRegistry;
use quartermaster::{Actor, MemoryStore, Store};
use uuid::Uuid;

pub struct World {
    pub store: MemoryStore,
    pub admin: Actor,
    pub manager: Actor,
    pub user: Actor,
    pub warehouse: Location,
    pub office: Location,
    pub kind: PropertyType,
}

impl World {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let warehouse = Location::new("Warehouse");
        let office = Location::new("Office");
        let kind = PropertyType::new("Computers");
        store.insert_location(&warehouse).expect("Failed to seed location");
        store.insert_location(&office).expect("Failed to seed location");
        store.insert_property_type(&kind).expect("Failed to seed property type");

        let admin = person(&store, Role::Admin, Some(warehouse.id));
        let manager = person(&store, Role::Manager, Some(office.id));
        let user = person(&store, Role::User, Some(office.id));
        Self {
            store,
            admin,
            manager,
            user,
            warehouse,
            office,
            kind,
        }
    }

    /// Register a property through the registry as the admin.
    pub fn register(&self, inventory_number: &str, location: &Location) -> Property {
        PropertyRegistry::new(&self.store)
            .create(
                &self.admin,
                NewProperty {
                    name: format!("Asset {inventory_number}"),
                    inventory_number: inventory_number.to_string(),
                    property_type_id: self.kind.id,
                    location_id: location.id,
                    ..NewProperty::default()
                },
            )
            .expect("Failed to register property")
    }

    pub fn reload(&self, property: &Property) -> Property {
        self.store
            .property(property.id)
            .expect("Failed to load property")
            .expect("Property vanished")
    }

    pub fn another(&self, role: Role, location: Option<&Location>) -> Actor {
        person(&self.store, role, location.map(|l| l.id))
    }
}

fn person(store: &MemoryStore, role: Role, location_id: Option<Uuid>) -> Actor {
    let full_name: String = Name(EN).fake();
    let suffix = Uuid::new_v4().simple().to_string();
    let username = format!("{}-{}", role.as_str().to_lowercase(), &suffix[..8]);
    let mut user = User::new(username, full_name, role);
    user.location_id = location_id;
    store.insert_user(&user).expect("Failed to seed user");
    Actor::new(user)
}
