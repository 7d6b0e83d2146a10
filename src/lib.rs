//! # Quartermaster
//!
//! Role-based asset and inventory management on the `may` coroutine runtime.
//!
//! Properties are registered with QR and barcode payloads, checked off in
//! inventory audits, handed between users with an append-only transfer
//! history and sent for repair through maintenance requests. Every workflow
//! runs against the [`Store`](store::Store) seam, backed by PostgreSQL
//! ([`PgStore`](store::PgStore) over a [`PgPool`](store::PgPool)) or kept in
//! process ([`MemoryStore`](store::MemoryStore)).

pub mod access;
pub mod codes;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod http;
pub mod metrics;
pub mod migration;
pub mod model;
pub mod store;
pub mod transaction;
pub mod workflow;

pub use access::{Actor, Permission};
pub use config::AppConfig;
pub use connection::{connect, validate_connection_string, ConnectionError};
pub use error::{WorkflowError, WorkflowResult};
pub use executor::{DbError, DbExecutor, PgExecutor};
pub use store::{MemoryStore, PgPool, PgStore, Store, StoreError, StoreProvider};
pub use transaction::{Transaction, TransactionError};
