//! Ingestion service: one writer per scenario
//!
//! [`IngestService`] owns the connection pool and the graph store. Each call
//! checks out one connection, loads the scenario inside a single immediate
//! transaction, records the run in the ledger, then projects the committed
//! entities into the graph. The two stores are not joined by a distributed
//! transaction; the ledger's graph status is how a half-finished run is found
//! again (see [`IngestService::pending_projections`]).

use crate::config::{ConfigError, IngestConfig};
use crate::graph::{GraphError, GraphNode, GraphOutcome, GraphProjector, GraphStore, NodeLabel, SqliteGraphStore};
use crate::loader::{load_scenario, GroundTruthGate, LoadReport, ScenarioContext, MAX_MESSAGE_LEN};
use crate::query::{
    EntityContext, EntityContextQuery, NameSearch, OwnershipChain, OwnershipChainQuery,
    SharedAddress, SharedAddressQuery,
};
use crate::scenario::{Scenario, ScenarioError};
use crate::storage::ledger::{self, mark_projection, record_run};
use crate::storage::{
    bootstrap, statistics, truncate_message, ConnectionPool, GraphStatus, RunRecord, StorageError,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rusqlite::TransactionBehavior;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Failures that abort an ingestion call
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Connection error: {0}")]
    Connection(StorageError),

    #[error("No connection available after {0:?}")]
    PoolExhausted(Duration),

    #[error("Scenario is already being ingested: {0}")]
    ScenarioBusy(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(#[from] ScenarioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PoolExhausted(waited) => IngestError::PoolExhausted(waited),
            other => IngestError::Connection(other),
        }
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Connection(StorageError::Database(err))
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Result of one ingestion call
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// Ledger row id
    pub run_id: String,
    /// Relational load, per category
    pub report: LoadReport,
    /// Graph projection totals, or why the projection failed
    pub graph: Result<GraphOutcome, String>,
}

impl IngestOutcome {
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.report.named_counts()
    }

    pub fn projected(&self) -> bool {
        self.graph.is_ok()
    }
}

/// Removes the scenario from the active set when the call ends
struct ScenarioGuard<'a> {
    active: &'a DashMap<String, ()>,
    scenario_id: String,
}

impl Drop for ScenarioGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.scenario_id);
    }
}

/// Entry point for loading scenarios
///
/// Cheap to share across threads; distinct scenarios ingest concurrently on
/// separate pooled connections.
pub struct IngestService {
    pool: ConnectionPool,
    graph: Arc<dyn GraphStore>,
    config: IngestConfig,
    /// Scenario ids with a call in flight
    active: DashMap<String, ()>,
}

impl IngestService {
    /// Open both stores named by `config`
    pub fn open(config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;
        let pool = ConnectionPool::open(&config.database, config.pool.clone())?;
        let graph = SqliteGraphStore::open(&config.graph_database)?;
        Ok(Self::with_graph(pool, Arc::new(graph), config))
    }

    /// Build a service over an existing pool and graph store
    pub fn with_graph(pool: ConnectionPool, graph: Arc<dyn GraphStore>, config: IngestConfig) -> Self {
        Self {
            pool,
            graph,
            config,
            active: DashMap::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn graph(&self) -> &dyn GraphStore {
        self.graph.as_ref()
    }

    /// Create the relational schema and graph indexes; safe to repeat
    pub fn bootstrap(&self) -> IngestResult<()> {
        let conn = self.pool.acquire()?;
        bootstrap(&conn)?;
        self.graph.ensure_indexes()?;
        Ok(())
    }

    pub fn ingest_path(&self, path: impl AsRef<Path>) -> IngestResult<IngestOutcome> {
        let scenario = Scenario::from_path(path)?;
        self.ingest(&scenario)
    }

    /// Load one scenario into both stores
    ///
    /// Record and category failures are folded into the outcome. `Err` means
    /// the run could not proceed at all: the pool was exhausted, the
    /// connection failed, or the same scenario is already in flight.
    pub fn ingest(&self, scenario: &Scenario) -> IngestResult<IngestOutcome> {
        let _guard = self.claim(&scenario.scenario_id)?;
        let mut conn = self.pool.acquire()?;

        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let mut ctx = ScenarioContext::new(
            scenario,
            GroundTruthGate::new(self.config.include_ground_truth),
            self.config.normalization,
        );

        let report = {
            let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let report = load_scenario(&mut tx, &mut ctx, scenario)?;
            record_run(
                &tx,
                &RunRecord {
                    run_id: run_id.clone(),
                    scenario_id: scenario.scenario_id.clone(),
                    started_at,
                    finished_at: Utc::now(),
                    include_ground_truth: self.config.include_ground_truth,
                    counts: report.named_counts(),
                    graph_status: GraphStatus::Pending,
                    graph_error: None,
                },
            )?;
            tx.commit()?;
            report
        };

        let graph = match GraphProjector::new(self.graph.as_ref()).project(scenario, &ctx) {
            Ok(outcome) => {
                mark_projection(&conn, &run_id, GraphStatus::Projected, None)?;
                let reconciled = ledger::reconcile_scenario(&conn, &scenario.scenario_id, &run_id)?;
                if reconciled > 0 {
                    info!(
                        scenario_id = %scenario.scenario_id,
                        runs = reconciled,
                        "earlier unprojected runs reconciled"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                let message = truncate_message(&e.to_string(), MAX_MESSAGE_LEN);
                warn!(
                    scenario_id = %scenario.scenario_id,
                    run_id = %run_id,
                    error = %message,
                    "graph projection failed; relational load kept"
                );
                mark_projection(&conn, &run_id, GraphStatus::Failed, Some(&message))?;
                Err(message)
            }
        };

        info!(
            scenario_id = %scenario.scenario_id,
            run_id = %run_id,
            inserted = report.total_inserted(),
            projected = graph.is_ok(),
            "ingest finished"
        );
        Ok(IngestOutcome { run_id, report, graph })
    }

    /// Runs whose relational side committed but whose graph side did not
    ///
    /// Re-ingesting the scenario is idempotent on both stores and completes
    /// the projection.
    pub fn pending_projections(&self) -> IngestResult<Vec<RunRecord>> {
        let conn = self.pool.acquire()?;
        Ok(ledger::pending_projections(&conn)?)
    }

    pub fn run(&self, run_id: &str) -> IngestResult<Option<RunRecord>> {
        let conn = self.pool.acquire()?;
        Ok(ledger::load_run(&conn, run_id)?)
    }

    /// Row counts per relational table
    pub fn statistics(&self) -> IngestResult<BTreeMap<String, i64>> {
        let conn = self.pool.acquire()?;
        Ok(statistics(&conn)?)
    }

    /// Fuzzy name search, limited by `graph.search_limit`
    pub fn search(&self, name: &str, label: Option<NodeLabel>) -> IngestResult<Vec<GraphNode>> {
        let mut query = NameSearch::new(name).limit(self.config.graph.search_limit);
        if let Some(label) = label {
            query = query.with_label(label);
        }
        Ok(query.execute(self.graph.as_ref())?)
    }

    pub fn ownership_chain(&self, company_id: &str) -> IngestResult<OwnershipChain> {
        Ok(OwnershipChainQuery::from(company_id)
            .max_depth(self.config.graph.ownership_max_depth)
            .execute(self.graph.as_ref())?)
    }

    pub fn entity_context(&self, node_id: &str) -> IngestResult<EntityContext> {
        Ok(EntityContextQuery::from(node_id)
            .depth(self.config.graph.context_depth)
            .execute(self.graph.as_ref())?)
    }

    pub fn shared_addresses(&self, node_id: &str) -> IngestResult<Vec<SharedAddress>> {
        Ok(SharedAddressQuery::for_entity(node_id).execute(self.graph.as_ref())?)
    }

    fn claim(&self, scenario_id: &str) -> IngestResult<ScenarioGuard<'_>> {
        match self.active.entry(scenario_id.to_string()) {
            Entry::Occupied(_) => Err(IngestError::ScenarioBusy(scenario_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(ScenarioGuard {
                    active: &self.active,
                    scenario_id: scenario_id.to_string(),
                })
            }
        }
    }
}
