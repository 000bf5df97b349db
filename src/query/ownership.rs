//! Upstream ownership traversal

use super::types::{OwnershipChain, OwnershipPath};
use crate::graph::{EdgePattern, GraphEdge, GraphResult, GraphStore, RelType};
use std::collections::{BTreeSet, HashMap};

/// Query for the owners above a company
///
/// Follows incoming `OWNS` and `CONTROLS` edges up to `max_depth` hops.
/// A path stops where a node has no owner, where the depth bound is hit, or
/// where the next owner already appears on the path.
#[derive(Debug, Clone)]
pub struct OwnershipChainQuery {
    pub company: String,
    pub max_depth: usize,
}

impl OwnershipChainQuery {
    pub fn from(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            max_depth: 5,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn execute(&self, store: &dyn GraphStore) -> GraphResult<OwnershipChain> {
        let mut chain = OwnershipChain::empty(self.company.clone());
        if store.node(&self.company)?.is_none() {
            return Ok(chain);
        }

        let mut owners = OwnerIndex::new(store);
        let mut ultimate: BTreeSet<String> = BTreeSet::new();

        // Depth-first over simple paths; each stack entry is a partial path
        let mut stack: Vec<(Vec<String>, Vec<GraphEdge>)> =
            vec![(vec![self.company.clone()], Vec::new())];

        while let Some((nodes, edges)) = stack.pop() {
            let Some(tip) = nodes.last() else {
                continue;
            };
            let upstream = owners.of(tip)?;

            if upstream.is_empty() {
                if !edges.is_empty() {
                    ultimate.insert(tip.clone());
                    chain.paths.push(OwnershipPath {
                        nodes,
                        edges,
                        reaches_ultimate_owner: true,
                    });
                }
                continue;
            }

            let extensions: Vec<GraphEdge> = upstream
                .into_iter()
                .filter(|e| !nodes.contains(&e.from))
                .collect();
            if edges.len() >= self.max_depth || extensions.is_empty() {
                if !edges.is_empty() {
                    chain.paths.push(OwnershipPath {
                        nodes,
                        edges,
                        reaches_ultimate_owner: false,
                    });
                }
                continue;
            }

            for edge in extensions {
                let mut next_nodes = nodes.clone();
                next_nodes.push(edge.from.clone());
                let mut next_edges = edges.clone();
                next_edges.push(edge);
                stack.push((next_nodes, next_edges));
            }
        }

        chain
            .paths
            .sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.nodes.cmp(&b.nodes)));
        for id in ultimate {
            if let Some(node) = store.node(&id)? {
                chain.ultimate_owners.push(node);
            }
        }
        Ok(chain)
    }
}

/// Memoized incoming ownership edges
struct OwnerIndex<'a> {
    store: &'a dyn GraphStore,
    incoming: HashMap<String, Vec<GraphEdge>>,
}

impl<'a> OwnerIndex<'a> {
    fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            incoming: HashMap::new(),
        }
    }

    fn of(&mut self, node_id: &str) -> GraphResult<Vec<GraphEdge>> {
        if let Some(edges) = self.incoming.get(node_id) {
            return Ok(edges.clone());
        }
        let edges = self
            .store
            .match_edges(&EdgePattern::any().to(node_id).rels(RelType::OWNERSHIP))?;
        self.incoming.insert(node_id.to_string(), edges.clone());
        Ok(edges)
    }
}
