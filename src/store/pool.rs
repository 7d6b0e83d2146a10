//! Bounded pool of persistent `may_postgres` connections.
//!
//! Connections are opened up front and parked in a crossbeam channel; a
//! request takes one out for its lifetime and the guard puts it back on drop.
//! A connection that fails its health check on checkout is reopened.

use super::{PgStore, StoreProvider, StoreResult};
use crate::config::DatabaseConfig;
use crate::connection::{connect, ConnectionError};
use crate::executor::{DbError, DbExecutor, PgExecutor};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum PoolError {
    Connection(ConnectionError),
    Timeout(Duration),
    Closed,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Connection(e) => write!(f, "Failed to open pooled connection: {e}"),
            PoolError::Timeout(d) => {
                write!(f, "No database connection became free within {}s", d.as_secs())
            }
            PoolError::Closed => write!(f, "Connection pool is closed"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<ConnectionError> for PoolError {
    fn from(err: ConnectionError) -> Self {
        PoolError::Connection(err)
    }
}

pub struct PgPool {
    idle_tx: Sender<PgExecutor>,
    idle_rx: Receiver<PgExecutor>,
    timeout: Duration,
    url: String,
}

impl PgPool {
    /// Open `max_connections` connections to `url`.
    pub fn open(config: &DatabaseConfig) -> Result<Self, PoolError> {
        let (idle_tx, idle_rx) = bounded(config.max_connections);
        for _ in 0..config.max_connections {
            let client = connect(&config.url)?;
            idle_tx
                .send(PgExecutor::new(client))
                .map_err(|_| PoolError::Closed)?;
        }
        log::info!("database pool ready with {} connection(s)", config.max_connections);
        Ok(Self {
            idle_tx,
            idle_rx,
            timeout: Duration::from_secs(config.pool_timeout_seconds),
            url: config.url.clone(),
        })
    }

    pub fn acquire_connection(&self) -> Result<PooledConnection, PoolError> {
        let executor = match self.idle_rx.recv_timeout(self.timeout) {
            Ok(executor) => executor,
            Err(RecvTimeoutError::Timeout) => return Err(PoolError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err(PoolError::Closed),
        };
        // the guard parks whatever it holds, so a failed reopen keeps the slot
        let mut conn = PooledConnection {
            executor: Some(executor),
            idle_tx: self.idle_tx.clone(),
        };
        if let Some(executor) = conn.executor.as_mut() {
            if !matches!(executor.check_health(), Ok(true)) {
                log::warn!("pooled connection failed its health check; reconnecting");
                *executor = PgExecutor::new(connect(&self.url)?);
            }
        }
        Ok(conn)
    }
}

impl StoreProvider for PgPool {
    type Store = PgStore<PooledConnection>;

    fn acquire(&self) -> StoreResult<Self::Store> {
        Ok(PgStore::new(self.acquire_connection()?))
    }
}

/// A connection checked out of a [`PgPool`].
pub struct PooledConnection {
    executor: Option<PgExecutor>,
    idle_tx: Sender<PgExecutor>,
}

impl PooledConnection {
    fn inner(&self) -> Result<&PgExecutor, DbError> {
        self.executor
            .as_ref()
            .ok_or_else(|| DbError::Other("pooled connection already returned".into()))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(executor) = self.executor.take() {
            if self.idle_tx.try_send(executor).is_err() {
                log::warn!("dropping connection: pool is full or closed");
            }
        }
    }
}

impl DbExecutor for PooledConnection {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.inner()?.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, DbError> {
        self.inner()?.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, DbError> {
        self.inner()?.query_all(query, params)
    }
}
