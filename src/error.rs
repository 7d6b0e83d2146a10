//! Errors surfaced by the workflows.

use crate::store::StoreError;
use std::fmt;

/// Workflow error type
///
/// The first three variants are request-scoped outcomes reported back to the
/// caller; `Persistence` wraps a store failure after the unit of work has
/// been rolled back.
#[derive(Debug)]
pub enum WorkflowError {
    /// Entity absent
    NotFound(String),
    /// Invalid input or a business rule refused the operation
    Validation(String),
    /// The acting user's role does not grant the operation
    Forbidden(String),
    /// Store failure
    Persistence(StoreError),
}

impl WorkflowError {
    pub fn not_found(what: impl fmt::Display) -> Self {
        WorkflowError::NotFound(format!("{what} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    /// Message shown to the caller. Persistence details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::NotFound(m)
            | WorkflowError::Validation(m)
            | WorkflowError::Forbidden(m) => m.clone(),
            WorkflowError::Persistence(_) => {
                "The operation could not be saved. Please try again.".to_string()
            }
        }
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::NotFound(m) => write!(f, "Not found: {m}"),
            WorkflowError::Validation(m) => write!(f, "Validation failed: {m}"),
            WorkflowError::Forbidden(m) => write!(f, "Forbidden: {m}"),
            WorkflowError::Persistence(e) => write!(f, "Persistence failure: {e}"),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkflowError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        WorkflowError::Persistence(err)
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
