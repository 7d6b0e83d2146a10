//! Tracked physical assets.

use super::column;
use crate::executor::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub property_type_id: Uuid,
    pub location_id: Uuid,
    pub assigned_user_id: Option<Uuid>,
    pub inventory_number: String,
    /// Stored at creation, never recomputed.
    pub qr_code: String,
    /// Stored at creation, never recomputed.
    pub barcode: String,
    pub cost: Option<Decimal>,
    pub balance_date: Option<NaiveDate>,
    pub usage_period_months: Option<i32>,
    pub last_maintenance_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_checked_in_last_inventory: bool,
    pub last_inventory_check_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            name: column(row, "name")?,
            description: column(row, "description")?,
            property_type_id: column(row, "property_type_id")?,
            location_id: column(row, "location_id")?,
            assigned_user_id: column(row, "assigned_user_id")?,
            inventory_number: column(row, "inventory_number")?,
            qr_code: column(row, "qr_code")?,
            barcode: column(row, "barcode")?,
            cost: column(row, "cost")?,
            balance_date: column(row, "balance_date")?,
            usage_period_months: column(row, "usage_period_months")?,
            last_maintenance_date: column(row, "last_maintenance_date")?,
            expiry_date: column(row, "expiry_date")?,
            is_checked_in_last_inventory: column(row, "is_checked_in_last_inventory")?,
            last_inventory_check_date: column(row, "last_inventory_check_date")?,
            created_at: column(row, "created_at")?,
        })
    }

    /// True when `code` is this property's QR payload or inventory number.
    pub fn matches_code(&self, code: &str) -> bool {
        self.qr_code == code || self.inventory_number == code
    }
}

/// Registration input, shared by the create form and the import sheet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub inventory_number: String,
    pub property_type_id: Uuid,
    pub location_id: Uuid,
    #[serde(default)]
    pub assigned_user_id: Option<Uuid>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub balance_date: Option<NaiveDate>,
    #[serde(default)]
    pub usage_period_months: Option<i32>,
    #[serde(default)]
    pub last_maintenance_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

/// Editable fields. The inventory number is the asset's identity and is not
/// part of this set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChanges {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub property_type_id: Uuid,
    pub location_id: Uuid,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub balance_date: Option<NaiveDate>,
    #[serde(default)]
    pub usage_period_months: Option<i32>,
    #[serde(default)]
    pub last_maintenance_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

/// Property selection; unset fields do not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    pub location_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
}

impl PropertyFilter {
    pub fn at_location(location_id: Uuid) -> Self {
        Self {
            location_id: Some(location_id),
            ..Self::default()
        }
    }

    pub fn assigned_to(user_id: Uuid) -> Self {
        Self {
            assigned_user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, property: &Property) -> bool {
        self.location_id.map_or(true, |id| property.location_id == id)
            && self
                .assigned_user_id
                .map_or(true, |id| property.assigned_user_id == Some(id))
    }
}
