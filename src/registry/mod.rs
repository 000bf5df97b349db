//! Canonical identifier generation and informal-id remapping
//!
//! Scenario documents use informal identifiers (`"E1"`, `"acct-7"`) that mean
//! nothing outside the document. Every row written to the bank schema gets a
//! canonical identifier instead, and the [`IdRegistry`] remembers which
//! informal id it stands for so later categories can resolve references.
//!
//! The registry lives for exactly one ingestion call. Canonical ids are unique
//! by construction (time-derived prefix plus a random suffix), so nothing
//! needs to be shared between runs.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Namespace of an informal id
///
/// An entity and an account may legitimately share the informal id `"1"`,
/// so every mapping is keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdKind {
    Customer,
    /// Customers whose company detail row exists
    Company,
    Account,
    Transaction,
    Counterparty,
    Officer,
    Relationship,
    Ownership,
    Address,
    Identifier,
    Alert,
}

impl IdKind {
    /// Prefix of canonical ids of this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            IdKind::Customer | IdKind::Company => "C",
            IdKind::Account => "A",
            IdKind::Transaction => "T",
            IdKind::Counterparty => "CP",
            IdKind::Officer => "OF",
            IdKind::Relationship => "R",
            IdKind::Ownership => "OW",
            IdKind::Address => "AD",
            IdKind::Identifier => "ID",
            IdKind::Alert => "AL",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Customer => "customer",
            IdKind::Company => "company",
            IdKind::Account => "account",
            IdKind::Transaction => "transaction",
            IdKind::Counterparty => "counterparty",
            IdKind::Officer => "officer",
            IdKind::Relationship => "relationship",
            IdKind::Ownership => "ownership",
            IdKind::Address => "address",
            IdKind::Identifier => "identifier",
            IdKind::Alert => "alert",
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic key identifying one input record across re-ingestion
///
/// Stored in the `ingest_key` column; a repeated record collides on it and is
/// skipped instead of duplicated.
pub fn ingest_key(scenario_id: &str, kind: IdKind, source_ref: &str) -> String {
    let name = format!("{}/{}/{}", scenario_id, kind.as_str(), source_ref);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Draw a fresh canonical id candidate: `<prefix><yymmdd><16 hex>`
fn candidate(kind: IdKind) -> String {
    let stamp = Utc::now().format("%y%m%d");
    let suffix = Uuid::new_v4().as_u128() as u64;
    format!("{}{}{:016X}", kind.prefix(), stamp, suffix)
}

type Mapping = HashMap<(IdKind, String), String>;

/// Scenario-scoped informal -> canonical id mapping
///
/// Mappings are staged in layers that mirror the loader's savepoints:
/// [`checkpoint`](Self::checkpoint) opens a layer, [`release`](Self::release)
/// merges it into its parent and [`discard`](Self::discard) forgets it. A
/// mapping made for a row that was rolled back therefore never resolves.
#[derive(Debug)]
pub struct IdRegistry {
    layers: Vec<Mapping>,
    issued: HashSet<String>,
    informal: HashSet<String>,
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdRegistry {
    pub fn new() -> Self {
        Self {
            layers: vec![Mapping::new()],
            issued: HashSet::new(),
            informal: HashSet::new(),
        }
    }

    /// Mark informal ids that a canonical id must never equal
    pub fn reserve_informal<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.informal.extend(ids.into_iter().map(Into::into));
    }

    /// Generate a canonical id distinct from everything issued or reserved
    pub fn generate(&mut self, kind: IdKind) -> String {
        loop {
            let id = candidate(kind);
            if !self.issued.contains(&id) && !self.informal.contains(&id) {
                self.issued.insert(id.clone());
                return id;
            }
        }
    }

    /// Record that `original` of `kind` is now known as `canonical`
    pub fn register(&mut self, kind: IdKind, original: &str, canonical: impl Into<String>) {
        let canonical = canonical.into();
        self.issued.insert(canonical.clone());
        if let Some(top) = self.layers.last_mut() {
            top.insert((kind, original.to_string()), canonical);
        }
    }

    /// Canonical id for `original`, innermost staged layer first
    pub fn resolve(&self, kind: IdKind, original: &str) -> Option<&str> {
        let key = (kind, original.to_string());
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.get(&key))
            .map(String::as_str)
    }

    /// Open a staging layer
    pub fn checkpoint(&mut self) {
        self.layers.push(Mapping::new());
    }

    /// Merge the innermost layer into its parent
    pub fn release(&mut self) {
        if self.layers.len() < 2 {
            return;
        }
        if let Some(top) = self.layers.pop() {
            if let Some(parent) = self.layers.last_mut() {
                parent.extend(top);
            }
        }
    }

    /// Drop the innermost layer and every mapping staged in it
    pub fn discard(&mut self) {
        if self.layers.len() > 1 {
            self.layers.pop();
        }
    }

    /// Number of open staging layers
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Number of visible mappings of `kind`
    pub fn count(&self, kind: IdKind) -> usize {
        let mut keys: HashSet<&String> = HashSet::new();
        for layer in &self.layers {
            keys.extend(
                layer
                    .keys()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, original)| original),
            );
        }
        keys.len()
    }

    /// Every visible (original, canonical) pair of `kind`
    pub fn mappings(&self, kind: IdKind) -> Vec<(String, String)> {
        let mut merged: HashMap<&str, &str> = HashMap::new();
        for layer in &self.layers {
            for ((k, original), canonical) in layer {
                if *k == kind {
                    merged.insert(original, canonical);
                }
            }
        }
        let mut pairs: Vec<(String, String)> = merged
            .into_iter()
            .map(|(o, c)| (o.to_string(), c.to_string()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_prefix_date_and_suffix() {
        let mut reg = IdRegistry::new();
        let id = reg.generate(IdKind::Customer);
        assert!(id.starts_with('C'));
        assert_eq!(id.len(), 1 + 6 + 16);
        assert!(id[1..7].chars().all(|c| c.is_ascii_digit()));
        assert!(id[7..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        let cp = reg.generate(IdKind::Counterparty);
        assert!(cp.starts_with("CP"));
        assert_eq!(cp.len(), 2 + 6 + 16);
    }

    #[test]
    fn register_and_resolve_are_namespaced() {
        let mut reg = IdRegistry::new();
        reg.register(IdKind::Customer, "1", "C1");
        reg.register(IdKind::Account, "1", "A1");
        assert_eq!(reg.resolve(IdKind::Customer, "1"), Some("C1"));
        assert_eq!(reg.resolve(IdKind::Account, "1"), Some("A1"));
        assert_eq!(reg.resolve(IdKind::Transaction, "1"), None);
    }

    #[test]
    fn released_layers_stay_visible() {
        let mut reg = IdRegistry::new();
        reg.checkpoint();
        reg.checkpoint();
        reg.register(IdKind::Customer, "E1", "C1");
        reg.release();
        reg.release();
        assert_eq!(reg.depth(), 0);
        assert_eq!(reg.resolve(IdKind::Customer, "E1"), Some("C1"));
    }

    #[test]
    fn discarded_layers_are_forgotten() {
        let mut reg = IdRegistry::new();
        reg.register(IdKind::Customer, "E1", "C1");
        reg.checkpoint();
        reg.register(IdKind::Customer, "E2", "C2");
        assert_eq!(reg.resolve(IdKind::Customer, "E2"), Some("C2"));
        reg.discard();
        assert_eq!(reg.resolve(IdKind::Customer, "E2"), None);
        assert_eq!(reg.resolve(IdKind::Customer, "E1"), Some("C1"));
    }

    #[test]
    fn release_and_discard_never_drop_the_base_layer() {
        let mut reg = IdRegistry::new();
        reg.register(IdKind::Account, "a", "A1");
        reg.release();
        reg.discard();
        assert_eq!(reg.resolve(IdKind::Account, "a"), Some("A1"));
    }

    #[test]
    fn count_and_mappings_merge_layers() {
        let mut reg = IdRegistry::new();
        reg.register(IdKind::Customer, "E1", "C1");
        reg.checkpoint();
        reg.register(IdKind::Customer, "E2", "C2");
        assert_eq!(reg.count(IdKind::Customer), 2);
        assert_eq!(
            reg.mappings(IdKind::Customer),
            vec![
                ("E1".to_string(), "C1".to_string()),
                ("E2".to_string(), "C2".to_string())
            ]
        );
    }

    #[test]
    fn ingest_key_is_deterministic() {
        let a = ingest_key("S1", IdKind::Customer, "E1");
        let b = ingest_key("S1", IdKind::Customer, "E1");
        let c = ingest_key("S2", IdKind::Customer, "E1");
        let d = ingest_key("S1", IdKind::Account, "E1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn generated_ids_are_unique_and_avoid_informal_ids() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        let mut reg = IdRegistry::new();
        let informal: Vec<String> = (0..50).map(|_| format!("E{}", rng.gen::<u32>())).collect();
        reg.reserve_informal(informal.clone());

        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let kind = if rng.gen_bool(0.5) { IdKind::Customer } else { IdKind::Account };
            let id = reg.generate(kind);
            assert!(!informal.contains(&id));
            assert!(seen.insert(id), "duplicate canonical id");
        }
    }
}
