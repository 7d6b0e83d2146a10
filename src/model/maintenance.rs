//! Repair tickets and their status machine.

use super::column;
use crate::executor::DbError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// `Requested -> InProgress -> Completed`, with `Cancelled` reachable from
/// either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    Requested,
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceStatus::Requested => "Requested",
            MaintenanceStatus::InProgress => "InProgress",
            MaintenanceStatus::Completed => "Completed",
            MaintenanceStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MaintenanceStatus::Completed | MaintenanceStatus::Cancelled)
    }

    /// `InProgress -> InProgress` is a re-assignment.
    pub fn can_transition_to(self, next: MaintenanceStatus) -> bool {
        use MaintenanceStatus::*;
        matches!(
            (self, next),
            (Requested, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (Requested, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Requested" => Ok(MaintenanceStatus::Requested),
            "InProgress" => Ok(MaintenanceStatus::InProgress),
            "Completed" => Ok(MaintenanceStatus::Completed),
            "Cancelled" => Ok(MaintenanceStatus::Cancelled),
            other => Err(DbError::ParseError(format!("unknown maintenance status `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRequest {
    pub id: Uuid,
    pub property_id: Uuid,
    pub requested_by_id: Uuid,
    pub assigned_to_user_id: Option<Uuid>,
    pub status: MaintenanceStatus,
    pub description: String,
    pub request_date: DateTime<Utc>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

impl MaintenanceRequest {
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, DbError> {
        let status: String = column(row, "status")?;
        Ok(Self {
            id: column(row, "id")?,
            property_id: column(row, "property_id")?,
            requested_by_id: column(row, "requested_by_id")?,
            assigned_to_user_id: column(row, "assigned_to_user_id")?,
            status: status.parse()?,
            description: column(row, "description")?,
            request_date: column(row, "request_date")?,
            assigned_date: column(row, "assigned_date")?,
            completion_date: column(row, "completion_date")?,
            resolution_notes: column(row, "resolution_notes")?,
        })
    }
}
