//! An executor that records statements instead of running them.
//!
//! Used to render a migration's DDL for checksumming, and by tests that
//! assert on the exact statement sequence a component issues.

use crate::executor::{DbError, DbExecutor};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::sync::Mutex;

#[derive(Debug)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
    rows_affected: u64,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::with_rows_affected(1)
    }
}

impl RecordingExecutor {
    /// Every `execute` reports `rows_affected` rows.
    pub fn with_rows_affected(rows_affected: u64) -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            rows_affected,
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record(&self, query: &str) {
        let mut statements = self
            .statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        statements.push(query.trim().to_string());
    }
}

impl DbExecutor for RecordingExecutor {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.record(query);
        Ok(self.rows_affected)
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, DbError> {
        self.record(query);
        Err(DbError::QueryError("recording executor returns no rows".into()))
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.record(query);
        Ok(Vec::new())
    }
}
