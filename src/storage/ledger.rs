//! Ingestion run ledger
//!
//! The relational store and the graph mirror do not share a transaction. Each
//! run writes an `IngestRun` row inside its relational transaction with graph
//! status `PENDING`, and flips it once projection finishes. Rows left `PENDING`
//! or `FAILED` name the scenarios whose graph side needs reconciling, until a
//! later run of the same scenario projects successfully and closes them.

use super::error::StorageResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    Pending,
    Projected,
    Failed,
}

impl GraphStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphStatus::Pending => "PENDING",
            GraphStatus::Projected => "PROJECTED",
            GraphStatus::Failed => "FAILED",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "PROJECTED" => GraphStatus::Projected,
            "FAILED" => GraphStatus::Failed,
            _ => GraphStatus::Pending,
        }
    }
}

/// One row of the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub scenario_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub include_ground_truth: bool,
    pub counts: BTreeMap<String, usize>,
    pub graph_status: GraphStatus,
    pub graph_error: Option<String>,
}

pub fn record_run(conn: &Connection, run: &RunRecord) -> StorageResult<()> {
    conn.execute(
        r#"
        INSERT INTO IngestRun (run_id, scenario_id, started_at, finished_at,
                               include_ground_truth, counts_json, graph_status, graph_error)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            run.run_id,
            run.scenario_id,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
            run.include_ground_truth,
            serde_json::to_string(&run.counts)?,
            run.graph_status.as_str(),
            run.graph_error,
        ],
    )?;
    Ok(())
}

pub fn mark_projection(
    conn: &Connection,
    run_id: &str,
    status: GraphStatus,
    error: Option<&str>,
) -> StorageResult<bool> {
    let changed = conn.execute(
        "UPDATE IngestRun SET graph_status = ?1, graph_error = ?2 WHERE run_id = ?3",
        params![status.as_str(), error, run_id],
    )?;
    Ok(changed > 0)
}

/// Close out earlier runs of a scenario once a later run has projected it
///
/// Re-ingestion is idempotent on the graph, so a successful projection also
/// covers whatever earlier runs of the same scenario left behind.
pub fn reconcile_scenario(conn: &Connection, scenario_id: &str, run_id: &str) -> StorageResult<usize> {
    let changed = conn.execute(
        "UPDATE IngestRun SET graph_status = 'PROJECTED'
         WHERE scenario_id = ?1 AND run_id != ?2 AND graph_status != 'PROJECTED'",
        params![scenario_id, run_id],
    )?;
    Ok(changed)
}

pub fn load_run(conn: &Connection, run_id: &str) -> StorageResult<Option<RunRecord>> {
    let row = conn
        .query_row(
            &format!("{} WHERE run_id = ?1", SELECT_RUN),
            params![run_id],
            read_row,
        )
        .optional()?;
    row.map(into_record).transpose()
}

/// Runs whose graph side never completed, oldest first
pub fn pending_projections(conn: &Connection) -> StorageResult<Vec<RunRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE graph_status != 'PROJECTED' ORDER BY started_at",
        SELECT_RUN
    ))?;
    let rows = stmt.query_map([], read_row)?;
    let mut runs = Vec::new();
    for row in rows {
        runs.push(into_record(row?)?);
    }
    Ok(runs)
}

const SELECT_RUN: &str = "SELECT run_id, scenario_id, started_at, finished_at, include_ground_truth,
        counts_json, graph_status, graph_error FROM IngestRun";

type RawRun = (String, String, String, String, bool, String, String, Option<String>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_record(raw: RawRun) -> StorageResult<RunRecord> {
    let (run_id, scenario_id, started, finished, gt, counts_json, status, graph_error) = raw;
    Ok(RunRecord {
        run_id,
        scenario_id,
        started_at: parse_ts(&started),
        finished_at: parse_ts(&finished),
        include_ground_truth: gt,
        counts: serde_json::from_str(&counts_json)?,
        graph_status: GraphStatus::parse(&status),
        graph_error,
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::bootstrap;

    fn run(id: &str, status: GraphStatus) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            run_id: id.to_string(),
            scenario_id: "S1".to_string(),
            started_at: now,
            finished_at: now,
            include_ground_truth: false,
            counts: BTreeMap::from([("customers".to_string(), 2)]),
            graph_status: status,
            graph_error: None,
        }
    }

    #[test]
    fn records_and_updates_runs() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        record_run(&conn, &run("R1", GraphStatus::Pending)).unwrap();
        record_run(&conn, &run("R2", GraphStatus::Projected)).unwrap();

        let pending = pending_projections(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].run_id, "R1");
        assert_eq!(pending[0].counts.get("customers"), Some(&2));

        assert!(mark_projection(&conn, "R1", GraphStatus::Failed, Some("graph down")).unwrap());
        let r1 = load_run(&conn, "R1").unwrap().unwrap();
        assert_eq!(r1.graph_status, GraphStatus::Failed);
        assert_eq!(r1.graph_error.as_deref(), Some("graph down"));

        assert!(mark_projection(&conn, "R1", GraphStatus::Projected, None).unwrap());
        assert!(pending_projections(&conn).unwrap().is_empty());
        assert!(!mark_projection(&conn, "nope", GraphStatus::Projected, None).unwrap());
    }

    #[test]
    fn later_projection_reconciles_earlier_runs() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        record_run(&conn, &run("R1", GraphStatus::Failed)).unwrap();
        record_run(&conn, &run("R2", GraphStatus::Projected)).unwrap();
        let other = RunRecord {
            scenario_id: "S2".to_string(),
            ..run("R3", GraphStatus::Failed)
        };
        record_run(&conn, &other).unwrap();

        assert_eq!(reconcile_scenario(&conn, "S1", "R2").unwrap(), 1);
        let pending = pending_projections(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].run_id, "R3");
        assert_eq!(load_run(&conn, "R1").unwrap().unwrap().graph_status, GraphStatus::Projected);
    }
}
