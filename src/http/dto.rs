//! Request bodies and reply shapes. Field names are camelCase on the wire.

use crate::model::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventoryBody {
    pub name: String,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckItemBody {
    pub inventory_id: Uuid,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBody {
    pub inventory_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyIdBody {
    pub property_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBody {
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub property_id: Uuid,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequestBody {
    pub request_id: Uuid,
    pub assignee_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequestBody {
    pub request_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdBody {
    pub request_id: Uuid,
}

/// Locations and property types share this shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserBody {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct HealthReply {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusReply {
    pub success: bool,
    pub message: String,
}

impl StatusReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckItemReply {
    pub success: bool,
    pub message: String,
    pub checked_items: i32,
    pub total_items: i32,
    pub is_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedReply {
    pub success: bool,
    pub deleted: usize,
}
