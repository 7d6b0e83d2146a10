//! Bulk registration from a spreadsheet exported as delimited text.
//!
//! Columns, in order: Name, Description, InventoryNumber, PropertyTypeName,
//! LocationName, AssignedUserName, BalanceDate, UsagePeriod (months), Cost,
//! LastMaintenanceDate, ExpiryDate. The first row is a header. Row numbers in
//! the report are spreadsheet rows, so the first data row is row 2.

use super::observe;
use super::registry::{build_property, duplicate, validate_new, PropertyRegistry};
use crate::access::{Actor, Permission};
use crate::error::{WorkflowError, WorkflowResult};
use crate::metrics;
use crate::model::{NewProperty, Property};
use crate::store::Store;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    pub errors: Vec<RowError>,
    /// More than `import.max_rows` data rows were sent; the rest were ignored.
    pub truncated: bool,
}

impl<'a, S: Store> PropertyRegistry<'a, S> {
    /// Validate every row, then write the valid ones in one unit of work.
    /// Invalid rows are reported and skipped; a store failure rolls the
    /// whole import back.
    pub fn import_csv(&self, actor: &Actor, data: &str) -> WorkflowResult<ImportReport> {
        observe("property.imported", || {
            actor.require(Permission::ImportProperties)?;
            let data = data.trim_start_matches('\u{feff}');
            let mut reader = ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .delimiter(detect_delimiter(data))
                .from_reader(data.as_bytes());

            let mut report = ImportReport::default();
            let mut pending: Vec<Property> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            let mut processed = 0;

            for (index, record) in reader.records().enumerate() {
                let fallback_row = index as u64 + 2;
                let record = match record {
                    Ok(record) => record,
                    Err(e) => {
                        let row = e.position().map_or(fallback_row, |p| p.line());
                        report.errors.push(RowError {
                            row,
                            message: format!("Unreadable row: {e}"),
                        });
                        continue;
                    }
                };
                if record.iter().all(|field| field.trim().is_empty()) {
                    continue;
                }
                if processed == self.import.max_rows {
                    report.truncated = true;
                    break;
                }
                processed += 1;

                let row = record.position().map_or(fallback_row, |p| p.line());
                let input = match self
                    .parse_row(&record)
                    .and_then(|input| validate_new(self.store, input))
                {
                    Ok(input) => input,
                    Err(e @ WorkflowError::Persistence(_)) => return Err(e),
                    Err(e) => {
                        report.errors.push(RowError {
                            row,
                            message: e.user_message(),
                        });
                        continue;
                    }
                };
                if !seen.insert(input.inventory_number.clone())
                    || self.store.inventory_number_exists(&input.inventory_number)?
                {
                    report.errors.push(RowError {
                        row,
                        message: duplicate(&input.inventory_number).user_message(),
                    });
                    continue;
                }
                pending.push(build_property(input));
            }

            let batch_size = self.import.batch_size.max(1);
            self.store.atomically(|s| {
                for (n, batch) in pending.chunks(batch_size).enumerate() {
                    s.insert_properties(batch)?;
                    log::debug!("import batch {} wrote {} row(s)", n + 1, batch.len());
                }
                Ok::<(), WorkflowError>(())
            })?;

            report.imported_count = pending.len();
            metrics::imported_rows(report.imported_count as u64);
            log::info!(
                "import by {}: {} imported, {} rejected{}",
                actor.user().username,
                report.imported_count,
                report.errors.len(),
                if report.truncated { ", truncated" } else { "" }
            );
            Ok(report)
        })
    }

    fn parse_row(&self, record: &StringRecord) -> WorkflowResult<NewProperty> {
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

        let type_name = required_cell("Property type", field(3))?;
        let property_type = self
            .store
            .property_type_by_name(type_name)?
            .ok_or_else(|| {
                WorkflowError::validation(format!("Unknown property type {type_name}"))
            })?;
        let location_name = required_cell("Location", field(4))?;
        let location = self
            .store
            .location_by_name(location_name)?
            .ok_or_else(|| WorkflowError::validation(format!("Unknown location {location_name}")))?;
        let assigned_user_id = match field(5) {
            "" => None,
            username => Some(
                self.store
                    .user_by_username(username)?
                    .ok_or_else(|| WorkflowError::validation(format!("Unknown user {username}")))?
                    .id,
            ),
        };

        Ok(NewProperty {
            name: field(0).to_string(),
            description: Some(field(1).to_string()),
            inventory_number: field(2).to_string(),
            property_type_id: property_type.id,
            location_id: location.id,
            assigned_user_id,
            balance_date: parse_date("Balance date", field(6))?,
            usage_period_months: parse_months(field(7))?,
            cost: parse_cost(field(8))?,
            last_maintenance_date: parse_date("Last maintenance date", field(9))?,
            expiry_date: parse_date("Expiry date", field(10))?,
        })
    }
}

/// `;` when the header line has more semicolons than commas.
fn detect_delimiter(data: &str) -> u8 {
    let header = data.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    if semicolons > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn required_cell<'r>(column: &str, value: &'r str) -> WorkflowResult<&'r str> {
    if value.is_empty() {
        Err(WorkflowError::validation(format!("{column} is required")))
    } else {
        Ok(value)
    }
}

fn parse_date(column: &str, value: &str) -> WorkflowResult<Option<NaiveDate>> {
    if value.is_empty() {
        return Ok(None);
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(Some)
        .ok_or_else(|| {
            WorkflowError::validation(format!(
                "{column} {value} is not a date (use YYYY-MM-DD or DD.MM.YYYY)"
            ))
        })
}

fn parse_months(value: &str) -> WorkflowResult<Option<i32>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| {
            WorkflowError::validation(format!("Usage period {value} is not a whole number"))
        })
}

/// Accepts `1299.90`, `1299,90` and `1 299,90`.
fn parse_cost(value: &str) -> WorkflowResult<Option<Decimal>> {
    if value.is_empty() {
        return Ok(None);
    }
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|_| WorkflowError::validation(format!("Cost {value} is not a number")))
}
