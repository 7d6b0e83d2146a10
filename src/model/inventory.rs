//! Audit runs and their per-property check-off rows.

use super::column;
use crate::executor::DbError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an audit was created over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum AuditScope {
    Location(Uuid),
    User(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: Uuid,
    pub name: String,
    pub scope: AuditScope,
    pub location_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub total_items: i32,
    pub checked_items: i32,
}

impl Inventory {
    pub fn new(
        name: impl Into<String>,
        scope: AuditScope,
        location_id: Uuid,
        total_items: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            scope,
            location_id,
            start_date: Utc::now(),
            end_date: None,
            is_completed: false,
            total_items,
            checked_items: 0,
        }
    }

    /// Expected columns include `scope_kind` (`location`/`user`) and `scope_user_id`.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, DbError> {
        let location_id: Uuid = column(row, "location_id")?;
        let scope_kind: String = column(row, "scope_kind")?;
        let scope = match scope_kind.as_str() {
            "location" => AuditScope::Location(location_id),
            "user" => {
                let user_id: Option<Uuid> = column(row, "scope_user_id")?;
                AuditScope::User(user_id.ok_or_else(|| {
                    DbError::ParseError("user-scoped audit without scope_user_id".into())
                })?)
            }
            other => return Err(DbError::ParseError(format!("unknown audit scope `{other}`"))),
        };
        Ok(Self {
            id: column(row, "id")?,
            name: column(row, "name")?,
            scope,
            location_id,
            start_date: column(row, "start_date")?,
            end_date: column(row, "end_date")?,
            is_completed: column(row, "is_completed")?,
            total_items: column(row, "total_items")?,
            checked_items: column(row, "checked_items")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub property_id: Uuid,
    pub is_checked: bool,
    pub check_date: Option<DateTime<Utc>>,
    pub checked_by_id: Option<Uuid>,
}

impl InventoryItem {
    pub fn pending(inventory_id: Uuid, property_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            inventory_id,
            property_id,
            is_checked: false,
            check_date: None,
            checked_by_id: None,
        }
    }

    pub fn from_row(row: &may_postgres::Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            property_id: column(row, "property_id")?,
            is_checked: column(row, "is_checked")?,
            check_date: column(row, "check_date")?,
            checked_by_id: column(row, "checked_by_id")?,
        })
    }
}
