//! Common test utilities for ingestion integration tests
//!
//! Every test gets its own temporary directory holding both SQLite stores,
//! so tests never share state and need no external services.

#![allow(dead_code)]

use rusqlite::Connection;
use scenario_ingest::config::PoolConfig;
use scenario_ingest::{IngestConfig, IngestService, Scenario};
use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// A bootstrapped service over stores in a temporary directory
pub struct TestEnv {
    pub dir: TempDir,
    pub service: IngestService,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Adjust the default test configuration before opening the stores
    pub fn with_config(adjust: impl FnOnce(&mut IngestConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = IngestConfig {
            database: dir.path().join("bank.db"),
            graph_database: dir.path().join("graph.db"),
            pool: PoolConfig {
                max_connections: 4,
                acquire_timeout_secs: 5,
                ..PoolConfig::default()
            },
            ..IngestConfig::default()
        };
        adjust(&mut config);
        let service = IngestService::open(config).unwrap();
        service.bootstrap().unwrap();
        Self { dir, service }
    }

    /// A separate connection for inspecting the relational store
    pub fn inspect(&self) -> Connection {
        Connection::open(&self.service.config().database).unwrap()
    }

    pub fn rows(&self, table: &str) -> i64 {
        self.inspect()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| r.get(0))
            .unwrap()
    }

    pub fn ingest(&self, value: Value) -> scenario_ingest::IngestOutcome {
        self.service.ingest(&scenario(value)).unwrap()
    }
}

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with warnings and errors on this thread captured as text lines
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.lines())
}

pub fn scenario(value: Value) -> Scenario {
    Scenario::from_value(&value).unwrap()
}

/// One person and one company, one account each, and three transactions of
/// which the third references only an account outside the scenario
pub fn two_entity_scenario() -> Value {
    json!({
        "scenario_id": "S-e2e",
        "typology": "layering",
        "entities": [
            {"entity_id": "E1", "entity_type": "person", "name": "Maria Ortega",
             "risk_rating": "high", "nationality": "MX", "address": "12 Calle Luna, Monterrey"},
            {"entity_id": "E2", "entity_type": "company", "name": "Luna Import Export LLC",
             "jurisdiction": "US", "address": {"line1": "900 Trade Blvd", "city": "Laredo", "country": "US"},
             "officers": [{"entity_id": "E1", "role": "UBO", "ownership_percentage": 100}]}
        ],
        "accounts": [
            {"account_id": "A1", "owner_id": "E1", "account_type": "checking", "currency": "USD",
             "open_date": "2021-04-01"},
            {"account_id": "A2", "owner_id": "E2", "account_type": "business", "currency": "USD",
             "open_date": "2021-05-15"}
        ],
        "transactions": [
            {"transaction_id": "T1", "from_account_id": "A1", "to_account_id": "A2", "amount": 9500,
             "transaction_type": "wire", "timestamp": "2023-01-05T10:00:00Z"},
            {"transaction_id": "T2", "from_account_id": "A2", "amount": 9400,
             "counterparty_name": "Pacific Trading Co", "timestamp": "2023-01-06T10:00:00Z"},
            {"transaction_id": "T3", "from_account_id": "EXT-999", "amount": 12000,
             "timestamp": "2023-01-07T10:00:00Z"}
        ],
        "relationships": [
            {"from_entity_id": "E1", "to_entity_id": "E2", "relationship_type": "beneficial_owner"}
        ],
        "ground_truth": {"entity_ids": ["E1", "E2"], "transaction_ids": ["T1", "T2"]}
    })
}

/// A company owned through an intermediate holding company
pub fn layered_ownership_scenario() -> Value {
    json!({
        "scenario_id": "S-layers",
        "entities": [
            {"entity_id": "P1", "entity_type": "person", "name": "Timothy D. Cook, CEO"},
            {"entity_id": "P2", "entity_type": "person", "name": "Tim Johnson"},
            {"entity_id": "H1", "entity_type": "holding", "name": "Orchard Holdings Ltd",
             "address": "1 Harbour Rd, Road Town",
             "beneficial_owners": [{"entity_id": "P1", "ownership_percentage": 80}]},
            {"entity_id": "C1", "entity_type": "shell_company", "name": "Blue Reef Trading",
             "address": "1 HARBOUR RD, Road Town",
             "officers": [
                {"entity_id": "P2", "role": "director"},
                {"name": "Nominee Services", "role": "secretary"}
             ]}
        ],
        "relationships": [
            {"from_entity_id": "H1", "to_entity_id": "C1", "relationship_type": "parent_company",
             "ownership_percentage": 100}
        ]
    })
}
