//! Query types and result structures

use crate::graph::{GraphEdge, GraphNode};
use serde::Serialize;

/// Direction for edge traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow outgoing edges (from -> to)
    Outgoing,
    /// Follow incoming edges (to <- from)
    Incoming,
    /// Follow edges in both directions
    #[default]
    Both,
}

/// One upstream path from a company towards an owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipPath {
    /// Node ids, starting at the queried company
    pub nodes: Vec<String>,
    /// Ownership or control edges, one per hop
    pub edges: Vec<GraphEdge>,
    /// The last node has no upstream owner of its own
    pub reaches_ultimate_owner: bool,
}

impl OwnershipPath {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn terminal(&self) -> &str {
        self.nodes.last().map(String::as_str).unwrap_or_default()
    }
}

/// Result of an ownership chain query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipChain {
    pub company: String,
    /// Paths in ascending length
    pub paths: Vec<OwnershipPath>,
    /// Terminal nodes with no further upstream owner
    pub ultimate_owners: Vec<GraphNode>,
}

impl OwnershipChain {
    pub fn empty(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            paths: Vec::new(),
            ultimate_owners: Vec::new(),
        }
    }

    pub fn is_ultimate_owner(&self, node_id: &str) -> bool {
        self.ultimate_owners.iter().any(|n| n.id == node_id)
    }
}

/// Entities sharing one address node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedAddress {
    pub address: GraphNode,
    /// Every entity registered there, ordered by id
    pub entities: Vec<GraphNode>,
}

/// Result of a multi-hop context query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityContext {
    /// Starting node
    pub origin: String,
    /// Nodes discovered at each hop; level 0 is the origin
    pub levels: Vec<Vec<GraphNode>>,
    /// Every edge between discovered nodes, each once
    pub edges: Vec<GraphEdge>,
}

impl EntityContext {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            levels: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// All nodes across all levels, excluding the origin
    pub fn all_nodes(&self) -> Vec<&GraphNode> {
        self.levels.iter().skip(1).flatten().collect()
    }

    pub fn at_depth(&self, depth: usize) -> &[GraphNode] {
        self.levels.get(depth).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn max_depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}
