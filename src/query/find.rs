//! Name search and co-location queries

use super::types::SharedAddress;
use crate::graph::{EdgePattern, GraphNode, GraphResult, GraphStore, NodeFilter, NodeLabel, RelType};
use std::collections::BTreeSet;

/// Fuzzy multi-token name search
///
/// The name is split on whitespace and a node matches only when every token
/// is a case-insensitive substring of its `name`, so `"Tim Cook"` finds
/// `"Timothy D. Cook, CEO"` but not `"Tim Johnson"`.
#[derive(Debug, Clone)]
pub struct NameSearch {
    filter: NodeFilter,
}

impl NameSearch {
    pub fn new(name: &str) -> Self {
        Self {
            filter: NodeFilter::new().with_name(name).with_limit(10),
        }
    }

    pub fn with_label(mut self, label: NodeLabel) -> Self {
        self.filter = self.filter.with_label(label);
        self
    }

    pub fn in_scenario(mut self, scenario_id: impl Into<String>) -> Self {
        self.filter = self.filter.with_scenario(scenario_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.filter = self.filter.with_limit(limit);
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> GraphResult<Vec<GraphNode>> {
        if self.filter.matches_nothing() {
            return Ok(Vec::new());
        }
        store.find_nodes(&self.filter)
    }
}

/// Query for entities registered at the same address node
#[derive(Debug, Clone, Default)]
pub struct SharedAddressQuery {
    /// Only addresses this entity is registered at
    pub entity: Option<String>,
    pub scenario_id: Option<String>,
}

impl SharedAddressQuery {
    /// Every address with more than one registered entity
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_entity(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            scenario_id: None,
        }
    }

    /// Only entities projected from this scenario
    pub fn in_scenario(mut self, scenario_id: impl Into<String>) -> Self {
        self.scenario_id = Some(scenario_id.into());
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> GraphResult<Vec<SharedAddress>> {
        let address_ids: Vec<String> = match &self.entity {
            Some(entity) => store
                .match_edges(&EdgePattern::any().from(entity.as_str()).rel(RelType::RegisteredAt))?
                .into_iter()
                .map(|e| e.to)
                .collect(),
            None => store
                .find_nodes(&NodeFilter::new().with_label(NodeLabel::Address))?
                .into_iter()
                .map(|n| n.id)
                .collect(),
        };

        let mut shared = Vec::new();
        for address_id in address_ids {
            let Some(address) = store.node(&address_id)? else {
                continue;
            };
            let residents: BTreeSet<String> = store
                .match_edges(&EdgePattern::any().to(address_id.as_str()).rel(RelType::RegisteredAt))?
                .into_iter()
                .map(|e| e.from)
                .collect();

            let mut entities = Vec::new();
            for id in residents {
                let Some(node) = store.node(&id)? else {
                    continue;
                };
                let in_scope = match &self.scenario_id {
                    Some(scenario_id) => {
                        node.property("scenario_id").and_then(|v| v.as_str()) == Some(scenario_id.as_str())
                    }
                    None => true,
                };
                if in_scope {
                    entities.push(node);
                }
            }
            if entities.len() > 1 {
                shared.push(SharedAddress { address, entities });
            }
        }
        Ok(shared)
    }
}
