//! Ground-truth gate
//!
//! Scenarios carry hidden labels (is this row part of the laundering pattern,
//! which typology). They are written to the underscore-prefixed columns only
//! when the gate is open, so the same scenario can be loaded blind to evaluate
//! a detection system.

use crate::registry::IdKind;
use crate::scenario::{GroundTruthLabel, Scenario};
use std::collections::HashSet;

/// Values for the `_is_suspicious`, `_typology` and `_scenario_id` columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruthColumns {
    pub is_suspicious: Option<bool>,
    pub typology: Option<String>,
    pub scenario_id: Option<String>,
}

/// Scenario-level labels flattened for lookup
#[derive(Debug, Clone, Default)]
pub struct ScenarioTruth {
    all_suspicious: bool,
    typology: Option<String>,
    entities: HashSet<String>,
    accounts: HashSet<String>,
    transactions: HashSet<String>,
}

impl ScenarioTruth {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut truth = Self {
            typology: scenario.typology.clone(),
            ..Self::default()
        };
        if let Some(gt) = &scenario.ground_truth {
            truth.all_suspicious = gt.all_suspicious;
            if truth.typology.is_none() {
                truth.typology = gt.typology.clone();
            }
            truth.entities = gt.entity_ids.iter().cloned().collect();
            truth.accounts = gt.account_ids.iter().cloned().collect();
            truth.transactions = gt.transaction_ids.iter().cloned().collect();
        }
        truth
    }

    fn listed(&self, kind: IdKind, source_ref: &str) -> bool {
        match kind {
            IdKind::Customer | IdKind::Company => self.entities.contains(source_ref),
            IdKind::Account => self.accounts.contains(source_ref),
            IdKind::Transaction => self.transactions.contains(source_ref),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundTruthGate {
    enabled: bool,
}

impl GroundTruthGate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Label columns for one record; all `None` when the gate is closed
    ///
    /// Suspicion resolves from the record's own label, then the scenario's id
    /// lists, then the scenario-wide flag. The scenario typology only applies
    /// to rows that resolved as suspicious.
    pub fn columns(
        &self,
        truth: &ScenarioTruth,
        scenario_id: &str,
        label: &GroundTruthLabel,
        kind: IdKind,
        source_ref: &str,
    ) -> GroundTruthColumns {
        if !self.enabled {
            return GroundTruthColumns::default();
        }
        let is_suspicious = label
            .is_suspicious
            .unwrap_or_else(|| truth.listed(kind, source_ref) || truth.all_suspicious);
        let typology = label.typology.clone().or_else(|| {
            if is_suspicious {
                truth.typology.clone()
            } else {
                None
            }
        });
        GroundTruthColumns {
            is_suspicious: Some(is_suspicious),
            typology,
            scenario_id: Some(scenario_id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn truth() -> ScenarioTruth {
        let scenario = Scenario::from_value(&json!({
            "scenario_id": "S1",
            "typology": "structuring",
            "ground_truth": {"transaction_ids": ["T1"]}
        }))
        .unwrap();
        ScenarioTruth::from_scenario(&scenario)
    }

    #[test]
    fn closed_gate_writes_nothing() {
        let gate = GroundTruthGate::new(false);
        let label = GroundTruthLabel {
            is_suspicious: Some(true),
            typology: Some("x".into()),
        };
        assert_eq!(
            gate.columns(&truth(), "S1", &label, IdKind::Transaction, "T1"),
            GroundTruthColumns::default()
        );
    }

    #[test]
    fn scenario_lists_mark_rows_suspicious() {
        let gate = GroundTruthGate::new(true);
        let cols = gate.columns(&truth(), "S1", &GroundTruthLabel::default(), IdKind::Transaction, "T1");
        assert_eq!(cols.is_suspicious, Some(true));
        assert_eq!(cols.typology.as_deref(), Some("structuring"));
        assert_eq!(cols.scenario_id.as_deref(), Some("S1"));

        let clean = gate.columns(&truth(), "S1", &GroundTruthLabel::default(), IdKind::Transaction, "T2");
        assert_eq!(clean.is_suspicious, Some(false));
        assert_eq!(clean.typology, None);
    }

    #[test]
    fn record_label_wins_over_scenario() {
        let gate = GroundTruthGate::new(true);
        let label = GroundTruthLabel {
            is_suspicious: Some(false),
            typology: None,
        };
        let cols = gate.columns(&truth(), "S1", &label, IdKind::Transaction, "T1");
        assert_eq!(cols.is_suspicious, Some(false));
    }
}
