//! Role to permission mapping.
//!
//! Every workflow entry point asks the [`Actor`] for one [`Permission`];
//! ownership rules (a manager completing only their own assignment, a user
//! cancelling only their own request) stay with the workflow.

use crate::error::WorkflowError;
use crate::model::{MaintenanceRequest, Role, User};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageProperties,
    DeleteProperties,
    ImportProperties,
    ExportProperties,
    ScanProperties,
    ConductAudits,
    DeleteAudits,
    TakeProperty,
    ReturnToWarehouse,
    ViewTransferHistory,
    RequestMaintenance,
    AssignMaintenance,
    CompleteMaintenance,
    CompleteAnyMaintenance,
    CancelAnyMaintenance,
    ManageReferenceData,
}

impl Permission {
    pub const ALL: [Permission; 16] = [
        Permission::ManageProperties,
        Permission::DeleteProperties,
        Permission::ImportProperties,
        Permission::ExportProperties,
        Permission::ScanProperties,
        Permission::ConductAudits,
        Permission::DeleteAudits,
        Permission::TakeProperty,
        Permission::ReturnToWarehouse,
        Permission::ViewTransferHistory,
        Permission::RequestMaintenance,
        Permission::AssignMaintenance,
        Permission::CompleteMaintenance,
        Permission::CompleteAnyMaintenance,
        Permission::CancelAnyMaintenance,
        Permission::ManageReferenceData,
    ];

    /// Whether `role` holds this permission.
    pub fn granted_to(self, role: Role) -> bool {
        use Permission::*;
        match self {
            ScanProperties | TakeProperty | RequestMaintenance => true,
            ManageProperties | ImportProperties | ExportProperties | ConductAudits
            | ViewTransferHistory | CompleteMaintenance => {
                matches!(role, Role::Admin | Role::Manager)
            }
            DeleteProperties | DeleteAudits | ReturnToWarehouse | AssignMaintenance
            | CompleteAnyMaintenance | CancelAnyMaintenance | ManageReferenceData => {
                role == Role::Admin
            }
        }
    }

    fn describe(self) -> &'static str {
        use Permission::*;
        match self {
            ManageProperties => "manage properties",
            DeleteProperties => "delete properties",
            ImportProperties => "import properties",
            ExportProperties => "export properties",
            ScanProperties => "scan properties",
            ConductAudits => "conduct inventory audits",
            DeleteAudits => "delete inventory audits",
            TakeProperty => "take property",
            ReturnToWarehouse => "return property to the warehouse",
            ViewTransferHistory => "view transfer history",
            RequestMaintenance => "request maintenance",
            AssignMaintenance => "assign maintenance requests",
            CompleteMaintenance => "complete maintenance requests",
            CompleteAnyMaintenance => "complete requests assigned to others",
            CancelAnyMaintenance => "cancel maintenance requests of other users",
            ManageReferenceData => "manage locations, types and users",
        }
    }
}

/// The authenticated user an operation runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    user: User,
}

impl Actor {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn location_id(&self) -> Option<Uuid> {
        self.user.location_id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn can(&self, permission: Permission) -> bool {
        permission.granted_to(self.user.role)
    }

    pub fn require(&self, permission: Permission) -> Result<(), WorkflowError> {
        if self.can(permission) {
            Ok(())
        } else {
            log::debug!(
                "{} ({}) denied: {permission:?}",
                self.user.username,
                self.user.role
            );
            Err(WorkflowError::Forbidden(format!(
                "Your role ({}) is not allowed to {}",
                self.user.role,
                permission.describe()
            )))
        }
    }

    /// Admin: everything. Manager: assigned to them or unassigned. User: their own.
    pub fn can_see_request(&self, request: &MaintenanceRequest) -> bool {
        match self.user.role {
            Role::Admin => true,
            Role::Manager => request
                .assigned_to_user_id
                .map_or(true, |assignee| assignee == self.user.id),
            Role::User => request.requested_by_id == self.user.id,
        }
    }
}
