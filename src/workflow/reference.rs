//! Locations, property types and users.

use super::{observe, optional_text, required_text};
use crate::access::{Actor, Permission};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{Location, PropertyType, Role, User};
use crate::store::Store;
use uuid::Uuid;

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

pub struct ReferenceData<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> ReferenceData<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn create_location(
        &self,
        actor: &Actor,
        name: &str,
        description: Option<&str>,
    ) -> WorkflowResult<Location> {
        observe("location.created", || {
            actor.require(Permission::ManageReferenceData)?;
            let location = Location {
                description: optional_text("Description", description, DESCRIPTION_MAX)?,
                ..Location::new(required_text("Location name", name, NAME_MAX)?)
            };
            if self.store.location_by_name(&location.name)?.is_some() {
                return Err(WorkflowError::validation(format!(
                    "Location {} already exists",
                    location.name
                )));
            }
            self.store.atomically(|s| s.insert_location(&location))?;
            log::info!("location {} created", location.name);
            Ok(location)
        })
    }

    pub fn create_property_type(
        &self,
        actor: &Actor,
        name: &str,
        description: Option<&str>,
    ) -> WorkflowResult<PropertyType> {
        observe("property_type.created", || {
            actor.require(Permission::ManageReferenceData)?;
            let property_type = PropertyType {
                description: optional_text("Description", description, DESCRIPTION_MAX)?,
                ..PropertyType::new(required_text("Type name", name, NAME_MAX)?)
            };
            if self.store.property_type_by_name(&property_type.name)?.is_some() {
                return Err(WorkflowError::validation(format!(
                    "Property type {} already exists",
                    property_type.name
                )));
            }
            self.store.atomically(|s| s.insert_property_type(&property_type))?;
            log::info!("property type {} created", property_type.name);
            Ok(property_type)
        })
    }

    pub fn create_user(
        &self,
        actor: &Actor,
        username: &str,
        full_name: &str,
        role: Role,
        location_id: Option<Uuid>,
    ) -> WorkflowResult<User> {
        observe("user.created", || {
            actor.require(Permission::ManageReferenceData)?;
            let username = required_text("Username", username, NAME_MAX)?;
            let full_name = required_text("Full name", full_name, NAME_MAX)?;
            if self.store.user_by_username(&username)?.is_some() {
                return Err(WorkflowError::validation(format!(
                    "Username {username} is already taken"
                )));
            }
            let mut user = User::new(username, full_name, role);
            if let Some(id) = location_id {
                if self.store.location(id)?.is_none() {
                    return Err(WorkflowError::validation("Unknown location"));
                }
                user = user.at_location(id);
            }
            self.store.atomically(|s| s.insert_user(&user))?;
            log::info!("user {} created as {}", user.username, user.role);
            Ok(user)
        })
    }

    pub fn locations(&self) -> WorkflowResult<Vec<Location>> {
        Ok(self.store.locations()?)
    }

    pub fn property_types(&self) -> WorkflowResult<Vec<PropertyType>> {
        Ok(self.store.property_types()?)
    }

    pub fn users(&self) -> WorkflowResult<Vec<User>> {
        Ok(self.store.users()?)
    }
}
