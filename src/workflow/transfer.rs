//! Reassigning property, with an append-only history.

use super::observe;
use crate::access::{Actor, Permission};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{Property, PropertyTransfer};
use crate::store::Store;
use chrono::Utc;
use uuid::Uuid;

pub struct TransferWorkflow<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> TransferWorkflow<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The acting user takes the property. It moves to their location when
    /// they have one.
    pub fn transfer_to_user(
        &self,
        actor: &Actor,
        property_id: Uuid,
    ) -> WorkflowResult<PropertyTransfer> {
        observe("transfer.to_user", || {
            actor.require(Permission::TakeProperty)?;
            self.move_to(actor, property_id, "Transferred")
        })
    }

    /// An admin takes the property back into the warehouse.
    pub fn return_to_warehouse(
        &self,
        actor: &Actor,
        property_id: Uuid,
    ) -> WorkflowResult<PropertyTransfer> {
        observe("transfer.to_warehouse", || {
            actor.require(Permission::ReturnToWarehouse)?;
            self.move_to(actor, property_id, "Returned to warehouse")
        })
    }

    /// Oldest first.
    pub fn history(
        &self,
        actor: &Actor,
        property_id: Uuid,
    ) -> WorkflowResult<Vec<PropertyTransfer>> {
        actor.require(Permission::ViewTransferHistory)?;
        if self.store.property(property_id)?.is_none() {
            return Err(WorkflowError::not_found("Property"));
        }
        Ok(self.store.transfers_for_property(property_id)?)
    }

    fn move_to(
        &self,
        actor: &Actor,
        property_id: Uuid,
        verb: &str,
    ) -> WorkflowResult<PropertyTransfer> {
        self.store.atomically(|s| {
            let property = s
                .property(property_id)?
                .ok_or_else(|| WorkflowError::not_found("Property"))?;
            if property.assigned_user_id == Some(actor.id()) {
                return Err(WorkflowError::validation("This property is already assigned to you"));
            }

            // unassigned property is recorded as coming from the acting user
            let from_user_id = property.assigned_user_id.unwrap_or_else(|| actor.id());
            let to_location_id = actor.location_id().unwrap_or(property.location_id);

            let location_name = |id: Uuid| -> WorkflowResult<String> {
                Ok(s.location(id)?
                    .map(|l| l.name)
                    .unwrap_or_else(|| "unknown location".to_string()))
            };
            let notes = format!(
                "{verb} from {} to {}",
                location_name(property.location_id)?,
                location_name(to_location_id)?
            );

            let transfer = PropertyTransfer {
                id: Uuid::new_v4(),
                property_id: property.id,
                from_user_id,
                to_user_id: actor.id(),
                transfer_date: Utc::now(),
                notes,
            };
            s.insert_transfer(&transfer)?;

            let moved = Property {
                assigned_user_id: Some(actor.id()),
                location_id: to_location_id,
                ..property
            };
            if !s.update_property(&moved)? {
                return Err(WorkflowError::not_found("Property"));
            }
            log::info!(
                "property {} assigned to {} ({})",
                moved.inventory_number,
                actor.user().username,
                transfer.notes
            );
            Ok(transfer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FailPoint;
    use crate::workflow::fixtures::Fixture;

    #[test]
    fn test_take_moves_property_to_users_location() {
        let fx = Fixture::new();
        let property = fx.property("INV-1", fx.warehouse.id);

        let transfer = TransferWorkflow::new(&fx.store)
            .transfer_to_user(&fx.user, property.id)
            .unwrap();

        assert_eq!(transfer.to_user_id, fx.user.id());
        assert_eq!(transfer.from_user_id, fx.user.id());
        assert_eq!(transfer.notes, "Transferred from Warehouse to Office");
        let stored = fx.store.property(property.id).unwrap().unwrap();
        assert_eq!(stored.assigned_user_id, Some(transfer.to_user_id));
        assert_eq!(stored.location_id, fx.office.id);
    }

    #[test]
    fn test_previous_holder_is_recorded() {
        let fx = Fixture::new();
        let property = fx.property("INV-1", fx.warehouse.id);
        let transfers = TransferWorkflow::new(&fx.store);
        transfers.transfer_to_user(&fx.user, property.id).unwrap();

        let second = transfers.transfer_to_user(&fx.manager, property.id).unwrap();
        assert_eq!(second.from_user_id, fx.user.id());
        assert_eq!(transfers.history(&fx.manager, property.id).unwrap().len(), 2);
    }

    #[test]
    fn test_user_without_location_keeps_property_location() {
        let fx = Fixture::new();
        let property = fx.property("INV-1", fx.warehouse.id);
        let drifter = crate::access::Actor::new(fx.user_without_location("drifter"));

        TransferWorkflow::new(&fx.store)
            .transfer_to_user(&drifter, property.id)
            .unwrap();
        let stored = fx.store.property(property.id).unwrap().unwrap();
        assert_eq!(stored.location_id, fx.warehouse.id);
    }

    #[test]
    fn test_return_requires_admin() {
        let fx = Fixture::new();
        let property = fx.property("INV-1", fx.warehouse.id);
        let transfers = TransferWorkflow::new(&fx.store);
        transfers.transfer_to_user(&fx.user, property.id).unwrap();
        let before = fx.store.property(property.id).unwrap().unwrap();

        for actor in [&fx.user, &fx.manager] {
            let err = transfers.return_to_warehouse(actor, property.id).unwrap_err();
            assert!(matches!(err, WorkflowError::Forbidden(_)));
        }
        assert_eq!(fx.store.property(property.id).unwrap().unwrap(), before);
        assert_eq!(fx.store.transfer_count(), 1);

        let back = transfers.return_to_warehouse(&fx.admin, property.id).unwrap();
        assert!(back.notes.starts_with("Returned to warehouse from Office"));
        let stored = fx.store.property(property.id).unwrap().unwrap();
        assert_eq!(stored.assigned_user_id, Some(fx.admin.id()));
        assert_eq!(stored.location_id, fx.warehouse.id);
    }

    #[test]
    fn test_failed_update_leaves_no_transfer_row() {
        let fx = Fixture::new();
        let property = fx.property("INV-1", fx.warehouse.id);
        fx.store.fail_next(FailPoint::UpdateProperty);

        let err = TransferWorkflow::new(&fx.store)
            .transfer_to_user(&fx.user, property.id)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Persistence(_)));
        assert_eq!(fx.store.transfer_count(), 0);
        assert_eq!(fx.store.property(property.id).unwrap().unwrap().assigned_user_id, None);
    }
}
