//! Network queries over the projected graph
//!
//! Ownership chains, shared addresses, multi-hop entity context and fuzzy
//! name search. Every query runs against any [`GraphStore`](crate::graph::GraphStore).

mod find;
mod ownership;
mod traverse;
mod types;

pub use find::{NameSearch, SharedAddressQuery};
pub use ownership::OwnershipChainQuery;
pub use traverse::EntityContextQuery;
pub use types::{Direction, EntityContext, OwnershipChain, OwnershipPath, SharedAddress};
