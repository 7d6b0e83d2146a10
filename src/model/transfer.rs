//! Append-only transfer history.

use super::column;
use crate::executor::DbError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTransfer {
    pub id: Uuid,
    pub property_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub transfer_date: DateTime<Utc>,
    pub notes: String,
}

impl PropertyTransfer {
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            property_id: column(row, "property_id")?,
            from_user_id: column(row, "from_user_id")?,
            to_user_id: column(row, "to_user_id")?,
            transfer_date: column(row, "transfer_date")?,
            notes: column(row, "notes")?,
        })
    }
}
