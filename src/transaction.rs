//! Transactions over any [`DbExecutor`].
//!
//! A [`Transaction`] borrows the executor it was opened on and issues
//! `BEGIN`/`COMMIT`/`ROLLBACK` through it. Statements sent through the same
//! executor while the transaction is open run inside it, which is what
//! `PgStore::atomically` relies on.
//! Dropping an open transaction rolls it back.

use crate::executor::{DbError, DbExecutor};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// Statement failed inside the transaction machinery
    Database(DbError),
    /// Transaction already committed or rolled back
    TransactionClosed,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Database(e) => write!(f, "Transaction statement failed: {e}"),
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<DbError> for TransactionError {
    fn from(err: DbError) -> Self {
        TransactionError::Database(err)
    }
}

impl From<TransactionError> for DbError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Database(e) => e,
            TransactionError::TransactionClosed => DbError::Other("Transaction closed".to_string()),
        }
    }
}

/// An open database transaction.
pub struct Transaction<'a> {
    executor: &'a dyn DbExecutor,
    closed: bool,
}

impl<'a> Transaction<'a> {
    /// Begin a transaction at the server's default isolation level.
    pub fn begin(executor: &'a dyn DbExecutor) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        executor.execute("BEGIN", &[])?;
        Ok(Self {
            executor,
            closed: false,
        })
    }

    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        self.closed = true;
        self.executor.execute("COMMIT", &[])?;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        self.closed = true;
        self.executor.execute("ROLLBACK", &[])?;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.executor.execute("ROLLBACK", &[]) {
                log::error!("rollback of abandoned transaction failed: {e}");
            }
        }
    }
}

impl DbExecutor for Transaction<'_> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.query_all(query, params)
    }
}
