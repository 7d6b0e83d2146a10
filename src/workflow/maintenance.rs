//! Repair tickets.

use super::{observe, optional_text, required_text};
use crate::access::{Actor, Permission};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{MaintenanceRequest, MaintenanceStatus};
use crate::store::Store;
use chrono::Utc;
use uuid::Uuid;

const TEXT_MAX: usize = 2000;

pub struct MaintenanceWorkflow<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> MaintenanceWorkflow<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn create_request(
        &self,
        actor: &Actor,
        property_id: Uuid,
        description: &str,
    ) -> WorkflowResult<MaintenanceRequest> {
        observe("maintenance.requested", || {
            actor.require(Permission::RequestMaintenance)?;
            let description = required_text("Description", description, TEXT_MAX)?;
            let property = self
                .store
                .property(property_id)?
                .ok_or_else(|| WorkflowError::not_found("Property"))?;

            let request = MaintenanceRequest {
                id: Uuid::new_v4(),
                property_id: property.id,
                requested_by_id: actor.id(),
                assigned_to_user_id: None,
                status: MaintenanceStatus::Requested,
                description,
                request_date: Utc::now(),
                assigned_date: None,
                completion_date: None,
                resolution_notes: None,
            };
            self.store
                .atomically(|s| s.insert_maintenance_request(&request))?;
            log::info!(
                "maintenance request {} opened for {} by {}",
                request.id,
                property.inventory_number,
                actor.user().username
            );
            Ok(request)
        })
    }

    /// Assign (or re-assign) a request; it moves to `InProgress`.
    pub fn assign_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        assignee_id: Uuid,
    ) -> WorkflowResult<MaintenanceRequest> {
        observe("maintenance.assigned", || {
            actor.require(Permission::AssignMaintenance)?;
            self.store.atomically(|s| {
                let request = s
                    .maintenance_request(request_id)?
                    .ok_or_else(|| WorkflowError::not_found("Maintenance request"))?;
                let assignee = s
                    .user(assignee_id)?
                    .ok_or_else(|| WorkflowError::not_found("Assignee"))?;
                Self::ensure_transition(&request, MaintenanceStatus::InProgress)?;

                let assigned = MaintenanceRequest {
                    assigned_to_user_id: Some(assignee.id),
                    status: MaintenanceStatus::InProgress,
                    assigned_date: Some(Utc::now()),
                    ..request
                };
                Self::save(s, &assigned)?;
                log::info!("maintenance request {} assigned to {}", assigned.id, assignee.username);
                Ok(assigned)
            })
        })
    }

    /// Admins complete any request; managers only the ones assigned to them.
    /// The property's last maintenance date becomes today.
    pub fn complete_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        notes: Option<&str>,
    ) -> WorkflowResult<MaintenanceRequest> {
        observe("maintenance.completed", || {
            actor.require(Permission::CompleteMaintenance)?;
            let notes = optional_text("Resolution notes", notes, TEXT_MAX)?;
            self.store.atomically(|s| {
                let request = s
                    .maintenance_request(request_id)?
                    .ok_or_else(|| WorkflowError::not_found("Maintenance request"))?;
                if request.assigned_to_user_id != Some(actor.id())
                    && !actor.can(Permission::CompleteAnyMaintenance)
                {
                    return Err(WorkflowError::validation("This request is not assigned to you"));
                }
                Self::ensure_transition(&request, MaintenanceStatus::Completed)?;

                let now = Utc::now();
                let completed = MaintenanceRequest {
                    status: MaintenanceStatus::Completed,
                    completion_date: Some(now),
                    resolution_notes: notes,
                    ..request
                };
                Self::save(s, &completed)?;

                if let Some(mut property) = s.property(completed.property_id)? {
                    property.last_maintenance_date = Some(now.date_naive());
                    s.update_property(&property)?;
                }
                log::info!("maintenance request {} completed", completed.id);
                Ok(completed)
            })
        })
    }

    /// The requester or an admin may cancel while the request is open.
    pub fn cancel_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> WorkflowResult<MaintenanceRequest> {
        observe("maintenance.cancelled", || {
            actor.require(Permission::RequestMaintenance)?;
            self.store.atomically(|s| {
                let request = s
                    .maintenance_request(request_id)?
                    .ok_or_else(|| WorkflowError::not_found("Maintenance request"))?;
                if request.requested_by_id != actor.id() {
                    actor.require(Permission::CancelAnyMaintenance)?;
                }
                Self::ensure_transition(&request, MaintenanceStatus::Cancelled)?;

                let cancelled = MaintenanceRequest {
                    status: MaintenanceStatus::Cancelled,
                    ..request
                };
                Self::save(s, &cancelled)?;
                log::info!("maintenance request {} cancelled", cancelled.id);
                Ok(cancelled)
            })
        })
    }

    /// Requests the actor may see, newest first.
    pub fn visible_requests(&self, actor: &Actor) -> WorkflowResult<Vec<MaintenanceRequest>> {
        Ok(self
            .store
            .maintenance_requests()?
            .into_iter()
            .filter(|r| actor.can_see_request(r))
            .collect())
    }

    fn ensure_transition(
        request: &MaintenanceRequest,
        next: MaintenanceStatus,
    ) -> WorkflowResult<()> {
        if request.status.is_terminal() {
            Err(WorkflowError::validation(format!(
                "This request is already {}",
                request.status.as_str().to_lowercase()
            )))
        } else if request.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(WorkflowError::validation(format!(
                "A {} request cannot become {next}",
                request.status
            )))
        }
    }

    fn save(s: &S, request: &MaintenanceRequest) -> WorkflowResult<()> {
        if s.update_maintenance_request(request)? {
            Ok(())
        } else {
            Err(WorkflowError::not_found("Maintenance request"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FailPoint;
    use crate::workflow::fixtures::Fixture;

    fn open_request(fx: &Fixture) -> MaintenanceRequest {
        let property = fx.property("INV-1", fx.office.id);
        MaintenanceWorkflow::new(&fx.store)
            .create_request(&fx.user, property.id, "Screen flickers")
            .unwrap()
    }

    #[test]
    fn test_full_lifecycle() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);
        assert_eq!(request.status, MaintenanceStatus::Requested);

        let assigned = workflow
            .assign_request(&fx.admin, request.id, fx.manager.id())
            .unwrap();
        assert_eq!(assigned.status, MaintenanceStatus::InProgress);
        assert!(assigned.assigned_date.is_some());

        let done = workflow
            .complete_request(&fx.manager, request.id, Some("Replaced cable"))
            .unwrap();
        assert_eq!(done.status, MaintenanceStatus::Completed);
        assert_eq!(done.resolution_notes.as_deref(), Some("Replaced cable"));
        let property = fx.store.property(request.property_id).unwrap().unwrap();
        assert_eq!(property.last_maintenance_date, done.completion_date.map(|d| d.date_naive()));
    }

    #[test]
    fn test_requested_cannot_jump_to_completed() {
        let fx = Fixture::new();
        let request = open_request(&fx);
        let err = MaintenanceWorkflow::new(&fx.store)
            .complete_request(&fx.admin, request.id, None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn test_manager_completes_only_own_assignment() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);
        workflow.assign_request(&fx.admin, request.id, fx.admin.id()).unwrap();

        let err = workflow.complete_request(&fx.manager, request.id, None).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(m) if m.contains("not assigned to you")));
        assert_eq!(
            fx.store.maintenance_request(request.id).unwrap().unwrap().status,
            MaintenanceStatus::InProgress
        );
    }

    #[test]
    fn test_assign_missing_request_or_assignee_changes_nothing() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);

        let missing = workflow
            .assign_request(&fx.admin, Uuid::new_v4(), fx.manager.id())
            .unwrap_err();
        assert!(matches!(missing, WorkflowError::NotFound(_)));
        let nobody = workflow
            .assign_request(&fx.admin, request.id, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(nobody, WorkflowError::NotFound(_)));
        assert_eq!(fx.store.maintenance_request(request.id).unwrap().unwrap(), request);

        let forbidden = workflow
            .assign_request(&fx.manager, request.id, fx.manager.id())
            .unwrap_err();
        assert!(matches!(forbidden, WorkflowError::Forbidden(_)));
    }

    #[test]
    fn test_reassigning_in_progress_keeps_status() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);
        workflow.assign_request(&fx.admin, request.id, fx.manager.id()).unwrap();
        let again = workflow.assign_request(&fx.admin, request.id, fx.admin.id()).unwrap();
        assert_eq!(again.status, MaintenanceStatus::InProgress);
        assert_eq!(again.assigned_to_user_id, Some(fx.admin.id()));
    }

    #[test]
    fn test_cancel_by_requester_or_admin_only() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);

        let err = workflow.cancel_request(&fx.manager, request.id).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let cancelled = workflow.cancel_request(&fx.user, request.id).unwrap();
        assert_eq!(cancelled.status, MaintenanceStatus::Cancelled);
        let err = workflow
            .assign_request(&fx.admin, request.id, fx.manager.id())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(m) if m.contains("already cancelled")));
    }

    #[test]
    fn test_failed_completion_keeps_request_in_progress() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);
        workflow.assign_request(&fx.admin, request.id, fx.admin.id()).unwrap();
        fx.store.fail_next(FailPoint::UpdateProperty);

        assert!(workflow.complete_request(&fx.admin, request.id, None).is_err());
        assert_eq!(
            fx.store.maintenance_request(request.id).unwrap().unwrap().status,
            MaintenanceStatus::InProgress
        );
    }

    #[test]
    fn test_visibility_follows_role() {
        let fx = Fixture::new();
        let workflow = MaintenanceWorkflow::new(&fx.store);
        let request = open_request(&fx);
        workflow.assign_request(&fx.admin, request.id, fx.admin.id()).unwrap();

        assert_eq!(workflow.visible_requests(&fx.admin).unwrap().len(), 1);
        assert_eq!(workflow.visible_requests(&fx.user).unwrap().len(), 1);
        assert!(workflow.visible_requests(&fx.manager).unwrap().is_empty());
    }
}
