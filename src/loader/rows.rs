//! Row-level write helpers shared by the category loaders

use super::context::ScenarioContext;
use super::outcome::{RecordError, Written};
use crate::registry::IdKind;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};

/// First column of the first row matching `param`, if any
pub(crate) fn query_id(
    conn: &Connection,
    sql: &str,
    param: &str,
) -> rusqlite::Result<Option<String>> {
    conn.prepare_cached(sql)?
        .query_row([param], |row| row.get(0))
        .optional()
}

/// Insert a row identified by its ingestion key, or find the one already there
///
/// Returns the canonical id in both cases. `insert` receives the freshly
/// generated id and the key and must use `ON CONFLICT DO NOTHING`.
pub(crate) fn upsert_keyed(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    kind: IdKind,
    source_ref: &str,
    lookup_sql: &str,
    insert: impl FnOnce(&Connection, &str, &str) -> rusqlite::Result<usize>,
) -> Result<(Written, String), RecordError> {
    let key = ctx.ingest_key(kind, source_ref);
    if let Some(existing) = query_id(conn, lookup_sql, &key)? {
        return Ok((Written::Skipped, existing));
    }

    let id = ctx.registry.generate(kind);
    if insert(conn, &id, &key)? > 0 {
        return Ok((Written::Inserted, id));
    }

    // Lost to a row with the same key or primary key
    match query_id(conn, lookup_sql, &key)? {
        Some(existing) => Ok((Written::Skipped, existing)),
        None => Err(RecordError::InvalidValue(format!(
            "{} '{}' conflicts with an existing row",
            kind, source_ref
        ))),
    }
}

/// `Inserted` when the statement touched a row
pub(crate) fn written(rows: usize) -> Written {
    if rows == 0 {
        Written::Skipped
    } else {
        Written::Inserted
    }
}

pub(crate) fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

pub(crate) fn timestamp_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Split a display name into first, middle and last parts
pub(crate) fn split_name(full: &str) -> (Option<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = full.split_whitespace().collect();
    match parts.as_slice() {
        [] => (None, None, None),
        [only] => (Some((*only).to_string()), None, None),
        [first, last] => (Some((*first).to_string()), None, Some((*last).to_string())),
        [first, middle @ .., last] => (
            Some((*first).to_string()),
            Some(middle.join(" ")),
            Some((*last).to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ground_truth::GroundTruthGate;
    use crate::normalize::Defaults;
    use crate::scenario::Scenario;

    #[test]
    fn split_name_parts() {
        assert_eq!(split_name("Ann Lee"), (Some("Ann".into()), None, Some("Lee".into())));
        assert_eq!(
            split_name("Timothy D. Cook"),
            (Some("Timothy".into()), Some("D.".into()), Some("Cook".into()))
        );
        assert_eq!(split_name("Cher"), (Some("Cher".into()), None, None));
        assert_eq!(split_name("  "), (None, None, None));
    }

    #[test]
    fn upsert_keyed_finds_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE k (id TEXT PRIMARY KEY, ingest_key TEXT NOT NULL UNIQUE)")
            .unwrap();
        let scenario = Scenario {
            scenario_id: "S1".into(),
            ..Scenario::default()
        };
        let mut ctx = ScenarioContext::new(&scenario, GroundTruthGate::new(false), Defaults::default());
        let lookup = "SELECT id FROM k WHERE ingest_key = ?1";
        let insert = |conn: &Connection, id: &str, key: &str| {
            conn.execute(
                "INSERT INTO k (id, ingest_key) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                [id, key],
            )
        };

        let (first, id) = upsert_keyed(&conn, &mut ctx, IdKind::Account, "A1", lookup, insert).unwrap();
        assert_eq!(first, Written::Inserted);
        assert!(id.starts_with('A'));

        let (second, again) = upsert_keyed(&conn, &mut ctx, IdKind::Account, "A1", lookup, insert).unwrap();
        assert_eq!(second, Written::Skipped);
        assert_eq!(again, id);
    }
}
