//! Business workflows.
//!
//! Each workflow borrows a [`Store`](crate::store::Store) for the duration of
//! one request, checks the acting user's permission once at its entry point
//! and runs multi-step writes inside `Store::atomically`.

pub mod audit;
pub mod export;
pub mod import;
pub mod labels;
pub mod maintenance;
pub mod reference;
pub mod registry;
pub mod transfer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use audit::{AuditDetail, AuditEngine, AuditLine, CheckOutcome};
pub use export::{ExportColumn, EXPORT_COLUMNS};
pub use import::{ImportReport, RowError};
pub use labels::{LabelCell, LabelRow};
pub use maintenance::MaintenanceWorkflow;
pub use reference::ReferenceData;
pub use registry::{PropertyRegistry, ScanResult};
pub use transfer::TransferWorkflow;

use crate::error::{WorkflowError, WorkflowResult};
use crate::metrics;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Run a state-changing operation: span, outcome metric and log line.
pub(crate) fn observe<T>(
    operation: &'static str,
    body: impl FnOnce() -> WorkflowResult<T>,
) -> WorkflowResult<T> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::workflow_span(operation).entered();

    let result = body();
    match &result {
        Ok(_) => metrics::event(operation),
        Err(WorkflowError::Persistence(e)) => {
            log::error!("{operation} failed and was rolled back: {e}");
        }
        Err(e) => {
            metrics::rejection(operation);
            log::debug!("{operation} rejected: {e}");
        }
    }
    result
}

/// Trimmed, non-empty, at most `max` characters.
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> WorkflowResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(WorkflowError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Trimmed; empty becomes `None`.
pub(crate) fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> WorkflowResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.chars().count() > max => Err(WorkflowError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        Some(v) => Ok(Some(v.to_string())),
    }
}
