//! Delimited-text export for spreadsheet users.
//!
//! Output is `;`-delimited UTF-8 with a byte-order mark, every field quoted
//! and one header row of column labels.

use super::registry::PropertyRegistry;
use crate::access::{Actor, Permission};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{Location, Property, PropertyFilter, PropertyType, User};
use crate::store::Store;
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One exportable column: request key and header label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportColumn {
    pub key: &'static str,
    pub label: &'static str,
}

pub const EXPORT_COLUMNS: [ExportColumn; 16] = [
    ExportColumn { key: "name", label: "Name" },
    ExportColumn { key: "description", label: "Description" },
    ExportColumn { key: "inventoryNumber", label: "Inventory number" },
    ExportColumn { key: "propertyType", label: "Property type" },
    ExportColumn { key: "location", label: "Location" },
    ExportColumn { key: "assignedUser", label: "Assigned user" },
    ExportColumn { key: "cost", label: "Cost" },
    ExportColumn { key: "balanceDate", label: "Balance date" },
    ExportColumn { key: "usagePeriodMonths", label: "Usage period (months)" },
    ExportColumn { key: "lastMaintenanceDate", label: "Last maintenance" },
    ExportColumn { key: "expiryDate", label: "Expiry date" },
    ExportColumn { key: "qrCode", label: "QR code" },
    ExportColumn { key: "barcode", label: "Barcode" },
    ExportColumn { key: "checkedInLastInventory", label: "Checked in last inventory" },
    ExportColumn { key: "lastInventoryCheckDate", label: "Last inventory check" },
    ExportColumn { key: "createdAt", label: "Created" },
];

/// Names for the ids a property row refers to.
struct Lookup {
    types: HashMap<Uuid, PropertyType>,
    locations: HashMap<Uuid, Location>,
    users: HashMap<Uuid, User>,
}

impl Lookup {
    fn load<S: Store>(store: &S) -> WorkflowResult<Self> {
        Ok(Self {
            types: store.property_types()?.into_iter().map(|t| (t.id, t)).collect(),
            locations: store.locations()?.into_iter().map(|l| (l.id, l)).collect(),
            users: store.users()?.into_iter().map(|u| (u.id, u)).collect(),
        })
    }

    fn cell(&self, property: &Property, key: &str) -> String {
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
        let value = match key {
            "name" => Some(property.name.clone()),
            "description" => property.description.clone(),
            "inventoryNumber" => Some(property.inventory_number.clone()),
            "propertyType" => self.types.get(&property.property_type_id).map(|t| t.name.clone()),
            "location" => self.locations.get(&property.location_id).map(|l| l.name.clone()),
            "assignedUser" => property
                .assigned_user_id
                .and_then(|id| self.users.get(&id))
                .map(|u| u.full_name.clone()),
            "cost" => property.cost.map(|c| c.to_string()),
            "balanceDate" => date(property.balance_date),
            "usagePeriodMonths" => property.usage_period_months.map(|m| m.to_string()),
            "lastMaintenanceDate" => date(property.last_maintenance_date),
            "expiryDate" => date(property.expiry_date),
            "qrCode" => Some(property.qr_code.clone()),
            "barcode" => Some(property.barcode.clone()),
            "checkedInLastInventory" => {
                Some(if property.is_checked_in_last_inventory { "Yes" } else { "No" }.to_string())
            }
            "lastInventoryCheckDate" => property
                .last_inventory_check_date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string()),
            "createdAt" => Some(property.created_at.format("%Y-%m-%d %H:%M").to_string()),
            _ => None,
        };
        value.unwrap_or_default()
    }
}

/// Resolve requested keys against [`EXPORT_COLUMNS`]; empty means all.
fn resolve_columns(requested: &[String]) -> WorkflowResult<Vec<ExportColumn>> {
    if requested.is_empty() {
        return Ok(EXPORT_COLUMNS.to_vec());
    }
    requested
        .iter()
        .map(|key| {
            EXPORT_COLUMNS
                .iter()
                .find(|c| c.key == key.trim())
                .copied()
                .ok_or_else(|| WorkflowError::validation(format!("Unknown export column {key}")))
        })
        .collect()
}

fn write_failed(e: impl std::fmt::Display) -> WorkflowError {
    log::error!("export could not be written: {e}");
    WorkflowError::validation("The export could not be written")
}

impl<'a, S: Store> PropertyRegistry<'a, S> {
    /// Every property, ordered by inventory number.
    pub fn export_csv(&self, actor: &Actor, columns: &[String]) -> WorkflowResult<Vec<u8>> {
        actor.require(Permission::ExportProperties)?;
        let columns = resolve_columns(columns)?;
        let properties = self.store.properties(&PropertyFilter::default())?;
        let lookup = Lookup::load(self.store)?;

        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .quote_style(QuoteStyle::Always)
            .from_writer(BOM.to_vec());
        writer
            .write_record(columns.iter().map(|c| c.label))
            .map_err(write_failed)?;
        for property in &properties {
            writer
                .write_record(columns.iter().map(|c| lookup.cell(property, c.key)))
                .map_err(write_failed)?;
        }
        let bytes = writer.into_inner().map_err(write_failed)?;
        log::info!(
            "{} exported {} propert(ies) x {} column(s)",
            actor.user().username,
            properties.len(),
            columns.len()
        );
        Ok(bytes)
    }
}
