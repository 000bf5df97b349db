//! Relational storage for scenario ingestion
//!
//! SQLite is the relational store. A bounded [`ConnectionPool`] hands one
//! connection to each ingestion run; [`schema::bootstrap`] creates the bank
//! schema and [`ledger`] tracks runs for graph reconciliation.

mod error;
pub mod ledger;
mod pool;
pub mod schema;

pub use error::{classify, is_fatal, truncate_message, ErrorClass, StorageError, StorageResult};
pub use ledger::{GraphStatus, RunRecord};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use schema::{bootstrap, statistics, TABLES};
