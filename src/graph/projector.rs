//! Projection of a loaded scenario into the property graph
//!
//! Runs after the relational load has committed, reading canonical ids from
//! the run's registry. Only records that received a canonical id are
//! projected; everything else was already reported by the loader.

use super::edge::{GraphEdge, RelType};
use super::node::{GraphNode, NodeLabel, PropertyValue};
use super::store::{EdgePattern, GraphResult, GraphStore};
use crate::loader::{customer_type_of, ScenarioContext};
use crate::normalize::{normalize, Categorical, CustomerType};
use crate::registry::IdKind;
use crate::scenario::{AddressRecord, EntityRecord, Scenario, TimelineRecord};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Totals of one projection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphOutcome {
    /// Node upserts, merged ones included
    pub nodes: usize,
    /// Edge upserts, merged ones included
    pub edges: usize,
    /// Edges not written because an endpoint was missing
    pub skipped_edges: usize,
}

/// Stable id of an address node
///
/// Identical addresses within one scenario collapse into one node. Address
/// nodes are scoped to their scenario, so co-location never links entities
/// of unrelated scenarios.
pub fn address_node_id(scenario_id: &str, address: &AddressRecord) -> String {
    let normalized = address
        .full_address()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let key = format!("{}/{}", scenario_id, normalized);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

fn timeline_node_id(customer_id: &str, record: &TimelineRecord) -> String {
    let key = format!("{}/{}", customer_id, record.source_ref);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Mirrors canonical entities and their relationships into a [`GraphStore`]
pub struct GraphProjector<'a> {
    store: &'a dyn GraphStore,
    outcome: GraphOutcome,
}

impl<'a> GraphProjector<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            outcome: GraphOutcome::default(),
        }
    }

    /// Project `scenario` using the canonical ids recorded in `ctx`
    pub fn project(mut self, scenario: &Scenario, ctx: &ScenarioContext) -> GraphResult<GraphOutcome> {
        let mut addresses: BTreeSet<String> = BTreeSet::new();

        for entity in scenario.entities.iter().flatten() {
            let Some(customer_id) = ctx.registry.resolve(IdKind::Customer, &entity.source_ref) else {
                debug!(source_ref = %entity.source_ref, "entity has no canonical id, not projected");
                continue;
            };
            let customer_id = customer_id.to_string();
            self.put_node(&entity_node(&customer_id, entity, ctx))?;

            if let Some(address) = &entity.address {
                let address_id = address_node_id(&ctx.scenario_id, address);
                self.put_node(
                    &GraphNode::new(&address_id, NodeLabel::Address)
                        .with_property("name", address.full_address())
                        .with_property("scenario_id", ctx.scenario_id.as_str())
                        .with_optional("city", address.city.clone())
                        .with_optional("country", address.country.clone()),
                )?;
                self.put_edge(&GraphEdge::new(&customer_id, &address_id, RelType::RegisteredAt))?;
                addresses.insert(address_id);
            }

            for event in entity.events.iter().flatten() {
                let node = timeline_node(&customer_id, event, NodeLabel::Event, ctx);
                self.put_node(&node)?;
                self.put_edge(&GraphEdge::new(&customer_id, &node.id, RelType::SubjectOf))?;
            }
            for filing in entity.filings.iter().flatten() {
                let node = timeline_node(&customer_id, filing, NodeLabel::Filing, ctx);
                self.put_node(&node)?;
                self.put_edge(&GraphEdge::new(&customer_id, &node.id, RelType::AssociatedWith))?;
            }
        }

        // Officers need every entity node in place first
        for entity in scenario.entities.iter().flatten() {
            let Some(company_id) = ctx.registry.resolve(IdKind::Company, &entity.source_ref) else {
                continue;
            };
            let company_id = company_id.to_string();
            for officer in entity.officers.iter().flatten() {
                let Some(officer_id) = ctx.registry.resolve(IdKind::Officer, &officer.source_ref) else {
                    continue;
                };
                let person_id = match officer
                    .entity_ref
                    .as_deref()
                    .and_then(|r| ctx.registry.resolve(IdKind::Customer, r))
                {
                    Some(customer_id) => customer_id.to_string(),
                    None => {
                        self.put_node(
                            &GraphNode::new(officer_id, NodeLabel::Person)
                                .with_property("name", officer.name.clone().unwrap_or_else(|| officer.source_ref.clone()))
                                .with_property("scenario_id", ctx.scenario_id.as_str())
                                .with_property("source_ref", officer.source_ref.as_str())
                                .with_optional("nationality", officer.nationality.clone()),
                        )?;
                        officer_id.to_string()
                    }
                };
                let officer_type = normalize(officer.role.as_deref(), ctx.defaults.officer_type);
                self.put_edge(
                    &GraphEdge::new(&person_id, &company_id, RelType::for_officer(officer_type))
                        .with_property("role", officer_type.as_str())
                        .with_optional("percent", officer.ownership_percentage),
                )?;
            }
        }

        for relationship in scenario.relationships.iter().flatten() {
            let from = relationship
                .from_ref
                .as_deref()
                .and_then(|r| ctx.registry.resolve(IdKind::Customer, r));
            let to = relationship
                .to_ref
                .as_deref()
                .and_then(|r| ctx.registry.resolve(IdKind::Customer, r));
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            let rel = normalize(relationship.relationship_type.as_deref(), RelType::RelatedTo);
            self.put_edge(
                &GraphEdge::new(from, to, rel)
                    .with_optional("relationship_type", relationship.relationship_type.clone())
                    .with_optional("percent", relationship.ownership_percentage)
                    .with_optional("since", relationship.start_date.map(|d| d.to_string())),
            )?;
        }

        for address_id in &addresses {
            self.link_co_located(address_id)?;
        }

        info!(
            scenario_id = %ctx.scenario_id,
            nodes = self.outcome.nodes,
            edges = self.outcome.edges,
            skipped_edges = self.outcome.skipped_edges,
            "scenario projected"
        );
        Ok(self.outcome)
    }

    /// Pairwise `SHARES_ADDRESS_WITH` between every entity registered at `address_id`
    fn link_co_located(&mut self, address_id: &str) -> GraphResult<()> {
        let residents: BTreeSet<String> = self
            .store
            .match_edges(&EdgePattern::any().to(address_id).rel(RelType::RegisteredAt))?
            .into_iter()
            .map(|e| e.from)
            .collect();
        let residents: Vec<String> = residents.into_iter().collect();
        for (i, a) in residents.iter().enumerate() {
            for b in &residents[i + 1..] {
                self.put_edge(
                    &GraphEdge::new(a, b, RelType::SharesAddressWith).with_property("address_id", address_id),
                )?;
            }
        }
        Ok(())
    }

    fn put_node(&mut self, node: &GraphNode) -> GraphResult<()> {
        self.store.upsert_node(node)?;
        self.outcome.nodes += 1;
        Ok(())
    }

    fn put_edge(&mut self, edge: &GraphEdge) -> GraphResult<()> {
        if self.store.upsert_edge(edge)? {
            self.outcome.edges += 1;
        } else {
            debug!(from = %edge.from, to = %edge.to, rel = %edge.rel, "edge endpoint missing");
            self.outcome.skipped_edges += 1;
        }
        Ok(())
    }
}

fn entity_node(customer_id: &str, entity: &EntityRecord, ctx: &ScenarioContext) -> GraphNode {
    let customer_type = customer_type_of(entity, &ctx.defaults);
    let subtype = match customer_type {
        CustomerType::Company => NodeLabel::Company,
        CustomerType::Person => NodeLabel::Person,
    };

    let identifiers: Vec<_> = entity
        .identifiers
        .iter()
        .flatten()
        .map(|id| json!({"type": id.id_type, "number": id.id_number}))
        .collect();
    let truth = ctx.ground_truth(&entity.ground_truth, IdKind::Customer, &entity.source_ref);

    let mut node = GraphNode::new(customer_id, NodeLabel::Entity)
        .with_label(subtype)
        .with_property(
            "name",
            entity.display_name().unwrap_or_else(|| entity.source_ref.clone()),
        )
        .with_property("scenario_id", ctx.scenario_id.as_str())
        .with_property("source_ref", entity.source_ref.as_str())
        .with_property("customer_type", customer_type.as_str())
        .with_optional("nationality", entity.nationality.clone())
        .with_optional("jurisdiction", entity.jurisdiction.clone())
        .with_optional("registration_number", entity.registration_number.clone())
        .with_optional("date_of_birth", entity.date_of_birth.map(|d| d.to_string()))
        .with_optional("is_pep", entity.is_pep.then_some(true))
        .with_optional("_is_suspicious", truth.is_suspicious)
        .with_optional("_typology", truth.typology);
    if !identifiers.is_empty() {
        node = node.with_optional("identifiers", PropertyValue::from_json(&json!(identifiers)));
    }
    node
}

fn timeline_node(
    customer_id: &str,
    record: &TimelineRecord,
    label: NodeLabel,
    ctx: &ScenarioContext,
) -> GraphNode {
    GraphNode::new(timeline_node_id(customer_id, record), label)
        .with_property(
            "name",
            record
                .description
                .clone()
                .or_else(|| record.kind.clone())
                .unwrap_or_else(|| record.source_ref.clone()),
        )
        .with_property("scenario_id", ctx.scenario_id.as_str())
        .with_property("source_ref", record.source_ref.as_str())
        .with_optional("kind", record.kind.clone())
        .with_optional("date", record.date.map(|d| d.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeFilter, SqliteGraphStore};
    use crate::loader::{load_scenario, GroundTruthGate};
    use crate::normalize::Defaults;
    use crate::storage::bootstrap;
    use rusqlite::Connection;
    use serde_json::json;

    fn project(value: serde_json::Value, gate: bool) -> (SqliteGraphStore, GraphOutcome, ScenarioContext) {
        let scenario = Scenario::from_value(&value).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        let mut ctx = ScenarioContext::new(&scenario, GroundTruthGate::new(gate), Defaults::default());
        let mut tx = conn.transaction().unwrap();
        load_scenario(&mut tx, &mut ctx, &scenario).unwrap();
        tx.commit().unwrap();

        let store = SqliteGraphStore::open_in_memory().unwrap();
        let outcome = GraphProjector::new(&store).project(&scenario, &ctx).unwrap();
        (store, outcome, ctx)
    }

    #[test]
    fn address_ids_ignore_case_and_spacing() {
        let a = AddressRecord {
            line1: Some("1 Harbour  Rd".into()),
            city: Some("Road Town".into()),
            ..AddressRecord::default()
        };
        let b = AddressRecord {
            line1: Some("1 HARBOUR RD".into()),
            city: Some("road town".into()),
            ..AddressRecord::default()
        };
        assert_eq!(address_node_id("S1", &a), address_node_id("S1", &b));
        assert_ne!(address_node_id("S1", &a), address_node_id("S2", &a));
    }

    #[test]
    fn entities_get_base_and_subtype_labels() {
        let (store, _, ctx) = project(
            json!({
                "scenario_id": "S-labels",
                "entities": [
                    {"entity_id": "P1", "entity_type": "person", "name": "Ann Lee", "is_suspicious": true},
                    {"entity_id": "C1", "entity_type": "company", "name": "Acme Ltd"}
                ]
            }),
            false,
        );
        let person_id = ctx.registry.resolve(IdKind::Customer, "P1").unwrap();
        let person = store.node(person_id).unwrap().unwrap();
        assert!(person.has_label(NodeLabel::Entity));
        assert!(person.has_label(NodeLabel::Person));
        assert_eq!(person.property("scenario_id").and_then(|v| v.as_str()), Some("S-labels"));
        assert!(person.property("_is_suspicious").is_none());

        let companies = store
            .find_nodes(&NodeFilter::new().with_label(NodeLabel::Company))
            .unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name(), Some("Acme Ltd"));
    }

    #[test]
    fn gate_controls_suspicion_property() {
        let (store, _, ctx) = project(
            json!({"entities": [{"entity_id": "P1", "name": "Ann Lee", "is_suspicious": true}]}),
            true,
        );
        let id = ctx.registry.resolve(IdKind::Customer, "P1").unwrap();
        let node = store.node(id).unwrap().unwrap();
        assert_eq!(node.property("_is_suspicious").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn co_located_entities_share_an_address() {
        let (store, _, ctx) = project(
            json!({
                "entities": [
                    {"entity_id": "C1", "entity_type": "company", "name": "Alpha", "address": "1 Harbour Rd, Road Town"},
                    {"entity_id": "C2", "entity_type": "company", "name": "Beta", "address": "1 harbour rd,  road town"},
                    {"entity_id": "C3", "entity_type": "company", "name": "Gamma", "address": "9 Elsewhere"}
                ]
            }),
            false,
        );
        let addresses = store.find_nodes(&NodeFilter::new().with_label(NodeLabel::Address)).unwrap();
        assert_eq!(addresses.len(), 2);
        for address in &addresses {
            assert_eq!(
                address.property("scenario_id").and_then(|v| v.as_str()),
                Some(ctx.scenario_id.as_str())
            );
        }

        let shared = store
            .match_edges(&EdgePattern::any().rel(RelType::SharesAddressWith))
            .unwrap();
        assert_eq!(shared.len(), 1);
        let c1 = ctx.registry.resolve(IdKind::Customer, "C1").unwrap();
        let c2 = ctx.registry.resolve(IdKind::Customer, "C2").unwrap();
        assert!(shared[0].other(c1) == c2);
    }

    #[test]
    fn officers_link_people_to_companies() {
        let (store, outcome, ctx) = project(
            json!({
                "entities": [
                    {"entity_id": "P1", "entity_type": "person", "name": "Dana Moss"},
                    {"entity_id": "C1", "entity_type": "company", "name": "Blue Reef",
                     "officers": [
                        {"entity_id": "P1", "role": "UBO", "ownership_percentage": 75},
                        {"name": "Sam Clerk", "role": "secretary"}
                     ],
                     "events": [{"event_type": "INCORPORATION", "date": "2019-03-01"}],
                     "filings": [{"filing_type": "ANNUAL_RETURN"}]}
                ]
            }),
            false,
        );
        assert_eq!(outcome.skipped_edges, 0);
        let c1 = ctx.registry.resolve(IdKind::Customer, "C1").unwrap();
        let p1 = ctx.registry.resolve(IdKind::Customer, "P1").unwrap();

        let owners = store.match_edges(&EdgePattern::any().to(c1).rel(RelType::Owns)).unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].from, p1);
        assert_eq!(owners[0].properties.get("percent").and_then(|v| v.as_f64()), Some(75.0));

        let officers = store.match_edges(&EdgePattern::any().to(c1).rel(RelType::OfficerOf)).unwrap();
        assert_eq!(officers.len(), 1);
        let clerk = store.node(&officers[0].from).unwrap().unwrap();
        assert!(clerk.has_label(NodeLabel::Person));
        assert_eq!(clerk.name(), Some("Sam Clerk"));

        assert_eq!(store.match_edges(&EdgePattern::any().from(c1).rel(RelType::SubjectOf)).unwrap().len(), 1);
        assert_eq!(store.match_edges(&EdgePattern::any().from(c1).rel(RelType::AssociatedWith)).unwrap().len(), 1);
    }

    #[test]
    fn projection_is_idempotent() {
        let value = json!({
            "scenario_id": "S-again",
            "entities": [
                {"entity_id": "E1", "name": "Ann Lee", "address": "5 Low St"},
                {"entity_id": "E2", "name": "Bo Lee", "address": "5 Low St"}
            ],
            "relationships": [{"from_entity_id": "E1", "to_entity_id": "E2", "relationship_type": "spouse"}]
        });
        let scenario = Scenario::from_value(&value).unwrap();
        let (store, _, ctx) = project(value, false);
        let before = store.counts().unwrap();
        GraphProjector::new(&store).project(&scenario, &ctx).unwrap();
        assert_eq!(store.counts().unwrap(), before);
        assert_eq!(store.match_edges(&EdgePattern::any().rel(RelType::FamilyOf)).unwrap().len(), 1);
    }
}
