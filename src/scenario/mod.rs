//! Scenario documents
//!
//! A scenario is one bundle of synthetic entities, accounts, transactions,
//! relationships and alerts, optionally carrying hidden ground-truth labels.
//! The document is validated once, here; records that cannot be coerced are
//! kept in place as [`RejectedRecord`]s so the loader can count them against
//! their category instead of failing the whole scenario.

mod fields;
mod records;

pub use fields::{FieldError, FieldResult, Fields};
pub use records::{
    AccountRecord, AddressRecord, AlertRecord, EntityRecord, GroundTruthLabel, IdentifierRecord,
    OfficerRecord, Parsed, RejectedRecord, RelationshipRecord, ScenarioGroundTruth,
    TimelineRecord, TransactionRecord,
};

use records::{
    parse_all, ACCOUNT_ID_KEYS, ALERT_ID_KEYS, ENTITY_ID_KEYS, RELATIONSHIP_ID_KEYS,
    TRANSACTION_ID_KEYS,
};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Errors that make a document unusable as a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario document must be a JSON object")]
    NotAnObject,

    #[error("'{0}' must be an array")]
    NotAnArray(&'static str),

    #[error("Invalid ground truth block: {0}")]
    GroundTruth(#[from] FieldError),
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// One validated scenario document
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub scenario_id: String,
    pub typology: Option<String>,
    pub entities: Vec<Parsed<EntityRecord>>,
    pub accounts: Vec<Parsed<AccountRecord>>,
    pub transactions: Vec<Parsed<TransactionRecord>>,
    pub relationships: Vec<Parsed<RelationshipRecord>>,
    pub alerts: Vec<Parsed<AlertRecord>>,
    pub ground_truth: Option<ScenarioGroundTruth>,
}

impl Scenario {
    pub fn from_value(value: &Value) -> ScenarioResult<Self> {
        let map = value.as_object().ok_or(ScenarioError::NotAnObject)?;
        let f = Fields::new(map);

        let scenario_id = f
            .text(&["scenario_id", "id", "name"])
            .ok()
            .flatten()
            .unwrap_or_else(|| document_id(value));

        let ground_truth = match f.object(&["ground_truth"]) {
            Some(gt) => Some(ScenarioGroundTruth::read(gt)?),
            None => None,
        };

        let typology = f
            .text(&["typology"])
            .ok()
            .flatten()
            .or_else(|| ground_truth.as_ref().and_then(|gt| gt.typology.clone()));

        Ok(Self {
            scenario_id,
            typology,
            entities: parse_all(collection(map, "entities")?, ENTITY_ID_KEYS, records::EntityRecord::read),
            accounts: parse_all(collection(map, "accounts")?, ACCOUNT_ID_KEYS, records::AccountRecord::read),
            transactions: parse_all(
                collection(map, "transactions")?,
                TRANSACTION_ID_KEYS,
                records::TransactionRecord::read,
            ),
            relationships: parse_all(
                collection(map, "relationships")?,
                RELATIONSHIP_ID_KEYS,
                records::RelationshipRecord::read,
            ),
            alerts: parse_all(collection(map, "alerts")?, ALERT_ID_KEYS, records::AlertRecord::read),
            ground_truth,
        })
    }

    pub fn from_json(json: &str) -> ScenarioResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ScenarioResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Every informal id appearing in the document
    pub fn informal_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for entity in self.entities.iter().flatten() {
            ids.push(entity.source_ref.clone());
            ids.extend(
                entity
                    .officers
                    .iter()
                    .flatten()
                    .map(|o| o.source_ref.clone()),
            );
        }
        ids.extend(self.accounts.iter().flatten().map(|a| a.source_ref.clone()));
        for txn in self.transactions.iter().flatten() {
            ids.push(txn.source_ref.clone());
            ids.extend(txn.from_account.iter().cloned());
            ids.extend(txn.to_account.iter().cloned());
        }
        ids.extend(self.relationships.iter().flatten().map(|r| r.source_ref.clone()));
        ids.extend(self.alerts.iter().flatten().map(|a| a.source_ref.clone()));
        ids
    }

    /// Number of records across all top-level collections, rejected included
    pub fn record_count(&self) -> usize {
        self.entities.len()
            + self.accounts.len()
            + self.transactions.len()
            + self.relationships.len()
            + self.alerts.len()
    }
}

/// Stable id for a document that names no scenario
///
/// Object keys serialize in sorted order, so the same document always
/// yields the same id and re-ingesting it stays idempotent.
fn document_id(value: &Value) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, value.to_string().as_bytes()).to_string()
}

fn collection<'a>(map: &'a Map<String, Value>, key: &'static str) -> ScenarioResult<&'a [Value]> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ScenarioError::NotAnArray(key)),
    }
}
