//! Multi-hop entity context

use super::types::{Direction, EntityContext};
use crate::graph::{EdgePattern, GraphEdge, GraphResult, GraphStore, RelType};
use std::collections::HashSet;

/// Query collecting every node and edge within a hop radius of an entity
#[derive(Debug, Clone)]
pub struct EntityContextQuery {
    /// Starting node ID
    pub origin: String,
    /// Maximum hops (0 = origin only, 1 = immediate neighbors, etc.)
    pub max_depth: usize,
    pub direction: Direction,
    /// Relationship types to follow; empty follows all
    pub rels: Vec<RelType>,
}

impl EntityContextQuery {
    pub fn from(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            max_depth: 2,
            direction: Direction::Both,
            rels: Vec::new(),
        }
    }

    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_rels(mut self, rels: &[RelType]) -> Self {
        self.rels = rels.to_vec();
        self
    }

    /// Breadth-first expansion
    ///
    /// A node appears once, at the level it was first reached. An edge
    /// appears once however many paths cross it.
    pub fn execute(&self, store: &dyn GraphStore) -> GraphResult<EntityContext> {
        let mut result = EntityContext::new(self.origin.clone());

        let Some(origin_node) = store.node(&self.origin)? else {
            return Ok(result);
        };

        let mut visited: HashSet<String> = HashSet::from([self.origin.clone()]);
        let mut seen_edges: HashSet<(String, String, RelType)> = HashSet::new();
        let mut current_level: Vec<String> = vec![self.origin.clone()];
        result.levels.push(vec![origin_node]);

        for _depth in 0..self.max_depth {
            if current_level.is_empty() {
                break;
            }

            let mut next_level: Vec<String> = Vec::new();
            let mut level_nodes = Vec::new();

            for node_id in &current_level {
                for edge in self.edges_of(store, node_id)? {
                    let neighbor_id = edge.other(node_id).to_string();
                    let key = (edge.from.clone(), edge.to.clone(), edge.rel);
                    if seen_edges.insert(key) {
                        result.edges.push(edge);
                    }

                    if visited.contains(&neighbor_id) {
                        continue;
                    }
                    if let Some(neighbor) = store.node(&neighbor_id)? {
                        visited.insert(neighbor_id.clone());
                        next_level.push(neighbor_id);
                        level_nodes.push(neighbor);
                    }
                }
            }

            if !level_nodes.is_empty() {
                result.levels.push(level_nodes);
            }
            current_level = next_level;
        }

        Ok(result)
    }

    fn edges_of(&self, store: &dyn GraphStore, node_id: &str) -> GraphResult<Vec<GraphEdge>> {
        let mut edges = Vec::new();
        if matches!(self.direction, Direction::Outgoing | Direction::Both) {
            edges.extend(store.match_edges(&EdgePattern::any().from(node_id).rels(&self.rels))?);
        }
        if matches!(self.direction, Direction::Incoming | Direction::Both) {
            edges.extend(store.match_edges(&EdgePattern::any().to(node_id).rels(&self.rels))?);
        }
        Ok(edges)
    }
}
