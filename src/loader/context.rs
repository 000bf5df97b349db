//! Per-call ingestion state

use super::ground_truth::{GroundTruthColumns, GroundTruthGate, ScenarioTruth};
use crate::normalize::Defaults;
use crate::registry::{ingest_key, IdKind, IdRegistry};
use crate::scenario::{GroundTruthLabel, Scenario};
use chrono::{DateTime, NaiveDate, Utc};

/// Everything one ingestion call needs besides the connection
///
/// Created at the start of a call, passed by `&mut` through every category
/// loader, and dropped when the call returns. Nothing here outlives a run, so
/// concurrent runs cannot see each other's id mappings.
#[derive(Debug)]
pub struct ScenarioContext {
    pub scenario_id: String,
    pub registry: IdRegistry,
    pub gate: GroundTruthGate,
    pub truth: ScenarioTruth,
    pub defaults: Defaults,
    pub loaded_at: DateTime<Utc>,
}

impl ScenarioContext {
    pub fn new(scenario: &Scenario, gate: GroundTruthGate, defaults: Defaults) -> Self {
        let mut registry = IdRegistry::new();
        registry.reserve_informal(scenario.informal_ids());
        Self {
            scenario_id: scenario.scenario_id.clone(),
            registry,
            gate,
            truth: ScenarioTruth::from_scenario(scenario),
            defaults,
            loaded_at: Utc::now(),
        }
    }

    /// Date used where the scenario omits one
    pub fn load_date(&self) -> NaiveDate {
        self.loaded_at.date_naive()
    }

    pub fn ingest_key(&self, kind: IdKind, source_ref: &str) -> String {
        ingest_key(&self.scenario_id, kind, source_ref)
    }

    pub fn ground_truth(
        &self,
        label: &GroundTruthLabel,
        kind: IdKind,
        source_ref: &str,
    ) -> GroundTruthColumns {
        self.gate
            .columns(&self.truth, &self.scenario_id, label, kind, source_ref)
    }
}
