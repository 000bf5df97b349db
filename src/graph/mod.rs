//! Property-graph mirror of loaded scenarios
//!
//! Customers, addresses, officers, events and filings are projected as typed
//! nodes and edges into a [`GraphStore`]. Upserts are keyed by stable ids, so
//! projecting the same scenario twice merges instead of duplicating.

mod edge;
mod node;
mod projector;
mod sqlite;
mod store;

pub use edge::{GraphEdge, RelType};
pub use node::{GraphNode, NodeLabel, Properties, PropertyValue};
pub use projector::{address_node_id, GraphOutcome, GraphProjector};
pub use sqlite::SqliteGraphStore;
pub use store::{EdgePattern, GraphError, GraphResult, GraphStore, NodeFilter};
