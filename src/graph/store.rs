//! Graph store trait definitions

use super::edge::{GraphEdge, RelType};
use super::node::{GraphNode, NodeLabel};
use thiserror::Error;

/// Errors that can occur during graph store operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown label or relationship type: {0}")]
    UnknownType(String),

    #[error("Graph store lock poisoned")]
    Poisoned,
}

/// Result type for graph store operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Filter criteria for querying nodes
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Only nodes carrying this label
    pub label: Option<NodeLabel>,
    /// Every token must appear, case-insensitively, in the node's name.
    /// A name without tokens matches nothing.
    pub name_tokens: Option<Vec<String>>,
    /// Only nodes whose `scenario_id` property equals this
    pub scenario_id: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: NodeLabel) -> Self {
        self.label = Some(label);
        self
    }

    /// Tokenize `name` on whitespace
    pub fn with_name(mut self, name: &str) -> Self {
        self.name_tokens = Some(name.split_whitespace().map(str::to_lowercase).collect());
        self
    }

    /// True when a name was given but holds no tokens
    pub fn matches_nothing(&self) -> bool {
        self.name_tokens.as_ref().is_some_and(|tokens| tokens.is_empty())
    }

    pub fn with_scenario(mut self, scenario_id: impl Into<String>) -> Self {
        self.scenario_id = Some(scenario_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Pattern for matching edges; unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct EdgePattern {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Allowed relationship types; empty allows all
    pub rels: Vec<RelType>,
}

impl EdgePattern {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from(mut self, node: impl Into<String>) -> Self {
        self.from = Some(node.into());
        self
    }

    pub fn to(mut self, node: impl Into<String>) -> Self {
        self.to = Some(node.into());
        self
    }

    pub fn rels(mut self, rels: &[RelType]) -> Self {
        self.rels = rels.to_vec();
        self
    }

    pub fn rel(self, rel: RelType) -> Self {
        self.rels(&[rel])
    }
}

/// Trait for property-graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent ingestion runs sharing one store.
pub trait GraphStore: Send + Sync {
    /// Create constraints and indexes; safe to call repeatedly
    fn ensure_indexes(&self) -> GraphResult<()>;

    /// Insert a node, or merge labels and properties into the existing one
    fn upsert_node(&self, node: &GraphNode) -> GraphResult<()>;

    /// Insert an edge, or merge properties into the existing one
    ///
    /// Returns `false` without writing when either endpoint is missing.
    fn upsert_edge(&self, edge: &GraphEdge) -> GraphResult<bool>;

    /// Load a node by id
    fn node(&self, id: &str) -> GraphResult<Option<GraphNode>>;

    /// Edges matching a pattern
    fn match_edges(&self, pattern: &EdgePattern) -> GraphResult<Vec<GraphEdge>>;

    /// Nodes matching a filter, ordered by name
    fn find_nodes(&self, filter: &NodeFilter) -> GraphResult<Vec<GraphNode>>;

    /// Node and edge totals
    fn counts(&self) -> GraphResult<(usize, usize)>;
}
