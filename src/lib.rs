//! Scenario ingestion for financial-crime test data
//!
//! Loads synthetic laundering scenarios into a normalized relational bank
//! schema and mirrors the same entities into a property graph for network
//! queries.
//!
//! # Core Concepts
//!
//! - **Scenarios**: loosely structured bundles of entities, accounts,
//!   transactions and relationships, validated once at the boundary
//! - **Canonical ids**: every row gets a generated id; informal input ids are
//!   remapped through a run-scoped registry
//! - **Checkpoints**: each category loads under its own savepoint, so one bad
//!   batch never aborts the scenario
//! - **Graph mirror**: customers, addresses and officers as typed nodes and
//!   edges, with ownership-chain and name-search queries
//!
//! # Example
//!
//! ```no_run
//! use scenario_ingest::{IngestConfig, IngestService};
//!
//! let service = IngestService::open(IngestConfig::default())?;
//! service.bootstrap()?;
//! let outcome = service.ingest_path("scenario.json")?;
//! println!("{:?}", outcome.counts());
//! # Ok::<(), scenario_ingest::IngestError>(())
//! ```

pub mod config;
pub mod graph;
pub mod ingest;
pub mod loader;
pub mod normalize;
pub mod query;
pub mod registry;
pub mod scenario;
pub mod storage;

pub use config::{ConfigError, IngestConfig};
pub use graph::{GraphError, GraphStore, SqliteGraphStore};
pub use ingest::{IngestError, IngestOutcome, IngestResult, IngestService};
pub use loader::{Category, LoadReport};
pub use scenario::{Scenario, ScenarioError};
pub use storage::{StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
