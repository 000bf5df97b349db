//! SQLite-backed property-graph store
//!
//! Kept in its own database file, separate from the relational bank schema,
//! so the two stores never share a session.

use super::edge::{GraphEdge, RelType};
use super::node::{GraphNode, NodeLabel, Properties};
use super::store::{EdgePattern, GraphError, GraphResult, GraphStore, NodeFilter};
use crate::normalize::Categorical;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Index statements run by [`GraphStore::ensure_indexes`]
///
/// Deliberately without `IF NOT EXISTS`: an existing index is reported by
/// SQLite and swallowed, like a constraint that already exists.
const INDEXES: &[(&str, &str)] = &[
    (
        "idx_graph_nodes_name",
        "CREATE INDEX idx_graph_nodes_name ON graph_nodes(name_folded)",
    ),
    (
        "idx_graph_nodes_scenario",
        "CREATE INDEX idx_graph_nodes_scenario ON graph_nodes(scenario_id)",
    ),
    (
        "idx_graph_edges_to",
        "CREATE INDEX idx_graph_edges_to ON graph_edges(to_id, rel)",
    ),
    (
        "idx_graph_labels_label",
        "CREATE INDEX idx_graph_labels_label ON graph_labels(label, node_id)",
    ),
];

const NODE_COLUMNS: &str = "n.id, n.properties_json,
    (SELECT group_concat(l.label, ',') FROM graph_labels l WHERE l.node_id = n.id)";

/// SQLite-backed graph store
///
/// Thread-safe via internal mutex on the connection.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> GraphResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> GraphResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS graph_nodes (
                id TEXT PRIMARY KEY,
                properties_json TEXT NOT NULL,
                name_folded TEXT,
                scenario_id TEXT
            );

            CREATE TABLE IF NOT EXISTS graph_labels (
                node_id TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
                label TEXT NOT NULL,
                PRIMARY KEY (node_id, label)
            );

            CREATE TABLE IF NOT EXISTS graph_edges (
                from_id TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
                to_id TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
                rel TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                PRIMARY KEY (from_id, to_id, rel)
            );

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> GraphResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| GraphError::Poisoned)
    }

    fn row_to_node(id: String, properties_json: String, labels: Option<String>) -> GraphResult<GraphNode> {
        let labels = labels
            .unwrap_or_default()
            .split(',')
            .filter(|l| !l.is_empty())
            .map(parse_label)
            .collect::<GraphResult<_>>()?;
        Ok(GraphNode {
            id,
            labels,
            properties: serde_json::from_str(&properties_json)?,
        })
    }

    fn stored_properties(conn: &Connection, sql: &str, key: &[&dyn ToSql]) -> GraphResult<Option<Properties>> {
        let json: Option<String> = conn
            .prepare_cached(sql)?
            .query_row(key, |row| row.get(0))
            .optional()?;
        Ok(match json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }
}

fn parse_label(text: &str) -> GraphResult<NodeLabel> {
    NodeLabel::VARIANTS
        .iter()
        .copied()
        .find(|l| l.as_str() == text)
        .ok_or_else(|| GraphError::UnknownType(text.to_string()))
}

fn parse_rel(text: &str) -> GraphResult<RelType> {
    RelType::VARIANTS
        .iter()
        .copied()
        .find(|r| r.as_str() == text)
        .ok_or_else(|| GraphError::UnknownType(text.to_string()))
}

fn is_already_exists(err: &rusqlite::Error) -> bool {
    err.to_string().contains("already exists")
}

impl GraphStore for SqliteGraphStore {
    fn ensure_indexes(&self) -> GraphResult<()> {
        let conn = self.lock()?;
        for (name, sql) in INDEXES {
            match conn.execute_batch(sql) {
                Ok(()) => debug!(index = name, "created graph index"),
                Err(e) if is_already_exists(&e) => {
                    debug!(index = name, "graph index already exists");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn upsert_node(&self, node: &GraphNode) -> GraphResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut properties = Self::stored_properties(
            &tx,
            "SELECT properties_json FROM graph_nodes WHERE id = ?1",
            &[&node.id],
        )?
        .unwrap_or_default();
        properties.extend(node.properties.clone());

        let name_folded = properties
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_lowercase);
        let scenario_id = properties
            .get("scenario_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        tx.prepare_cached(
            r#"
            INSERT INTO graph_nodes (id, properties_json, name_folded, scenario_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                properties_json = excluded.properties_json,
                name_folded = excluded.name_folded,
                scenario_id = excluded.scenario_id
            "#,
        )?
        .execute(params![
            node.id,
            serde_json::to_string(&properties)?,
            name_folded,
            scenario_id,
        ])?;

        for label in &node.labels {
            tx.prepare_cached(
                "INSERT INTO graph_labels (node_id, label) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            )?
            .execute(params![node.id, label.as_str()])?;
        }

        tx.commit()?;
        Ok(())
    }

    fn upsert_edge(&self, edge: &GraphEdge) -> GraphResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let endpoints: i64 = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM graph_nodes WHERE id = ?1)
                  + (SELECT COUNT(*) FROM graph_nodes WHERE id = ?2)",
            params![edge.from, edge.to],
            |row| row.get(0),
        )?;
        if endpoints < 2 {
            return Ok(false);
        }

        let rel = edge.rel.as_str();
        let mut properties = Self::stored_properties(
            &tx,
            "SELECT properties_json FROM graph_edges WHERE from_id = ?1 AND to_id = ?2 AND rel = ?3",
            &[&edge.from, &edge.to, &rel],
        )?
        .unwrap_or_default();
        properties.extend(edge.properties.clone());

        tx.prepare_cached(
            r#"
            INSERT INTO graph_edges (from_id, to_id, rel, properties_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(from_id, to_id, rel) DO UPDATE SET
                properties_json = excluded.properties_json
            "#,
        )?
        .execute(params![
            edge.from,
            edge.to,
            rel,
            serde_json::to_string(&properties)?
        ])?;

        tx.commit()?;
        Ok(true)
    }

    fn node(&self, id: &str) -> GraphResult<Option<GraphNode>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM graph_nodes n WHERE n.id = ?1", NODE_COLUMNS),
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, properties, labels)) => Ok(Some(Self::row_to_node(id, properties, labels)?)),
            None => Ok(None),
        }
    }

    fn match_edges(&self, pattern: &EdgePattern) -> GraphResult<Vec<GraphEdge>> {
        let conn = self.lock()?;

        let mut sql = String::from("SELECT from_id, to_id, rel, properties_json FROM graph_edges WHERE 1 = 1");
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref from) = pattern.from {
            sql.push_str(" AND from_id = ?");
            params_vec.push(Box::new(from.clone()));
        }
        if let Some(ref to) = pattern.to {
            sql.push_str(" AND to_id = ?");
            params_vec.push(Box::new(to.clone()));
        }
        if !pattern.rels.is_empty() {
            let placeholders = vec!["?"; pattern.rels.len()].join(", ");
            sql.push_str(&format!(" AND rel IN ({})", placeholders));
            for rel in &pattern.rels {
                params_vec.push(Box::new(rel.as_str()));
            }
        }
        sql.push_str(" ORDER BY from_id, to_id, rel");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (from, to, rel, properties) = row?;
            edges.push(GraphEdge {
                from,
                to,
                rel: parse_rel(&rel)?,
                properties: serde_json::from_str(&properties)?,
            });
        }
        Ok(edges)
    }

    fn find_nodes(&self, filter: &NodeFilter) -> GraphResult<Vec<GraphNode>> {
        if filter.matches_nothing() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM graph_nodes n WHERE 1 = 1", NODE_COLUMNS);
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(label) = filter.label {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM graph_labels l WHERE l.node_id = n.id AND l.label = ?)",
            );
            params_vec.push(Box::new(label.as_str()));
        }
        for token in filter.name_tokens.iter().flatten() {
            sql.push_str(" AND instr(n.name_folded, ?) > 0");
            params_vec.push(Box::new(token.to_lowercase()));
        }
        if let Some(ref scenario_id) = filter.scenario_id {
            sql.push_str(" AND n.scenario_id = ?");
            params_vec.push(Box::new(scenario_id.clone()));
        }
        sql.push_str(" ORDER BY n.name_folded, n.id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            let (id, properties, labels) = row?;
            nodes.push(Self::row_to_node(id, properties, labels)?);
        }
        Ok(nodes)
    }

    fn counts(&self) -> GraphResult<(usize, usize)> {
        let conn = self.lock()?;
        let (nodes, edges): (i64, i64) = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM graph_nodes), (SELECT COUNT(*) FROM graph_edges)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((nodes as usize, edges as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteGraphStore {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.ensure_indexes().unwrap();
        store
    }

    #[test]
    fn ensure_indexes_is_repeatable() {
        let store = store();
        store.ensure_indexes().unwrap();
        store.ensure_indexes().unwrap();
    }

    #[test]
    fn upsert_node_merges_instead_of_duplicating() {
        let store = store();
        store
            .upsert_node(&GraphNode::new("C1", NodeLabel::Entity).with_property("name", "Acme Ltd"))
            .unwrap();
        store
            .upsert_node(
                &GraphNode::new("C1", NodeLabel::Company).with_property("jurisdiction", "VG"),
            )
            .unwrap();

        let node = store.node("C1").unwrap().unwrap();
        assert!(node.has_label(NodeLabel::Entity));
        assert!(node.has_label(NodeLabel::Company));
        assert_eq!(node.name(), Some("Acme Ltd"));
        assert_eq!(store.counts().unwrap(), (1, 0));
    }

    #[test]
    fn edges_need_both_endpoints() {
        let store = store();
        store.upsert_node(&GraphNode::new("A", NodeLabel::Entity)).unwrap();
        assert!(!store.upsert_edge(&GraphEdge::new("A", "B", RelType::Owns)).unwrap());

        store.upsert_node(&GraphNode::new("B", NodeLabel::Entity)).unwrap();
        let edge = GraphEdge::new("A", "B", RelType::Owns).with_property("percent", 60.0);
        assert!(store.upsert_edge(&edge).unwrap());
        assert!(store.upsert_edge(&edge).unwrap());

        let edges = store.match_edges(&EdgePattern::any().to("B").rel(RelType::Owns)).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].properties.get("percent").and_then(|p| p.as_f64()), Some(60.0));
        assert!(store.match_edges(&EdgePattern::any().rel(RelType::Controls)).unwrap().is_empty());
    }

    #[test]
    fn multi_token_name_search() {
        let store = store();
        for (id, name) in [("C1", "Timothy D. Cook, CEO"), ("C2", "Tim Johnson"), ("C3", "Cook Street Bakery")] {
            store
                .upsert_node(&GraphNode::new(id, NodeLabel::Entity).with_property("name", name))
                .unwrap();
        }
        let hits = store.find_nodes(&NodeFilter::new().with_name("Tim Cook")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "C1");

        let limited = store.find_nodes(&NodeFilter::new().with_name("cook").with_limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
        let people = store
            .find_nodes(&NodeFilter::new().with_name("tim").with_label(NodeLabel::Person))
            .unwrap();
        assert!(people.is_empty());
    }

    #[test]
    fn blank_name_matches_nothing() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .upsert_node(&GraphNode::new("C1", NodeLabel::Entity).with_property("name", "Tim Cook"))
            .unwrap();

        assert!(store.find_nodes(&NodeFilter::new().with_name("")).unwrap().is_empty());
        assert!(store.find_nodes(&NodeFilter::new().with_name(" \t ")).unwrap().is_empty());
        // no name at all still lists by label
        let all = store.find_nodes(&NodeFilter::new().with_label(NodeLabel::Entity)).unwrap();
        assert_eq!(all.len(), 1);
    }
}
