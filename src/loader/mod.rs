//! Dependency-ordered relational loader
//!
//! Categories load in a fixed order so every reference points backwards:
//!
//! ```text
//! customers → persons → companies → addresses → identifiers → officers
//!   → accounts → ownerships → counterparties → transactions
//!   → relationships → alerts
//! ```
//!
//! Each category runs under its own checkpoint (see [`checkpoint`]); the
//! caller owns the outer transaction and decides when to commit.

mod accounts;
mod checkpoint;
mod context;
mod customers;
pub mod ground_truth;
mod links;
mod outcome;
mod rows;
mod transactions;

pub use context::ScenarioContext;
pub use ground_truth::{GroundTruthColumns, GroundTruthGate};
pub use outcome::{
    BatchReport, Category, LoadReport, RecordError, RecordIssue, RecordOutcome, Written,
    MAX_MESSAGE_LEN,
};
pub use transactions::{infer_booking, Booking};

pub(crate) use customers::customer_type_of;

use crate::scenario::Scenario;
use crate::storage::StorageResult;
use rusqlite::Transaction;
use std::time::Instant;
use tracing::{info, warn};

type CategoryLoader =
    fn(&mut Transaction<'_>, &mut ScenarioContext, &Scenario) -> StorageResult<BatchReport>;

const PIPELINE: [(Category, CategoryLoader); 12] = [
    (Category::Customers, customers::load_customers),
    (Category::Persons, customers::load_persons),
    (Category::Companies, customers::load_companies),
    (Category::Addresses, customers::load_addresses),
    (Category::Identifiers, customers::load_identifiers),
    (Category::Officers, customers::load_officers),
    (Category::Accounts, accounts::load_accounts),
    (Category::Ownerships, accounts::load_ownerships),
    (Category::Counterparties, transactions::load_counterparties),
    (Category::Transactions, transactions::load_transactions),
    (Category::Relationships, links::load_relationships),
    (Category::Alerts, links::load_alerts),
];

/// Load every category of `scenario` inside `tx`
///
/// Record and batch failures are folded into the report. An `Err` means the
/// connection itself failed and `tx` should be dropped.
pub fn load_scenario(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<LoadReport> {
    let started = Instant::now();
    info!(
        scenario_id = %ctx.scenario_id,
        records = scenario.record_count(),
        ground_truth = ctx.gate.enabled(),
        "loading scenario"
    );

    let mut report = LoadReport::new(ctx.scenario_id.clone());
    for (category, load) in PIPELINE {
        let batch = load(tx, ctx, scenario)?;
        debug_assert_eq!(batch.category, category);
        report.batches.push(batch);
    }

    for category in report.aborted() {
        warn!(scenario_id = %ctx.scenario_id, category = %category, "category rolled back");
    }
    info!(
        scenario_id = %ctx.scenario_id,
        inserted = report.total_inserted(),
        skipped = report.total_skipped(),
        errors = report.total_errors(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scenario loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Defaults;
    use crate::storage::bootstrap;
    use rusqlite::Connection;
    use serde_json::json;

    fn load(conn: &mut Connection, scenario: &Scenario, gate: bool) -> LoadReport {
        let mut ctx = ScenarioContext::new(scenario, GroundTruthGate::new(gate), Defaults::default());
        let mut tx = conn.transaction().unwrap();
        let report = load_scenario(&mut tx, &mut ctx, scenario).unwrap();
        tx.commit().unwrap();
        report
    }

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        bootstrap(&conn).unwrap();
        conn
    }

    #[test]
    fn pipeline_covers_every_category_in_order() {
        let order: Vec<Category> = PIPELINE.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, Category::ALL.to_vec());
    }

    #[test]
    fn company_with_officers_and_identifiers() {
        let scenario = Scenario::from_value(&json!({
            "scenario_id": "S-officers",
            "entities": [
                {"entity_id": "P1", "entity_type": "person", "name": "Dana Whitfield Moss",
                 "tax_id": "123-45-6789", "address": "1 Harbour Rd"},
                {"entity_id": "C1", "entity_type": "shell_company", "name": "Blue Reef Holdings",
                 "jurisdiction": "VG",
                 "beneficial_owners": [{"entity_id": "P1", "name": "Dana Moss", "ownership_percentage": 100}],
                 "address": {"line1": "1 Harbour Rd"}}
            ]
        }))
        .unwrap();
        let mut conn = db();
        let report = load(&mut conn, &scenario, false);

        assert_eq!(report.count(Category::Customers), 2);
        assert_eq!(report.count(Category::Persons), 1);
        assert_eq!(report.count(Category::Companies), 1);
        assert_eq!(report.count(Category::Addresses), 2);
        assert_eq!(report.count(Category::Identifiers), 1);
        assert_eq!(report.count(Category::Officers), 1);

        let (legal_form, first, last): (String, String, String) = conn
            .query_row(
                "SELECT c.legal_form, p.first_name, p.last_name
                 FROM CustomerCompany c, CustomerPerson p",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(legal_form, "LLC");
        assert_eq!(first, "Dana");
        assert_eq!(last, "Moss");

        let (officer_type, beneficial, linked): (String, bool, bool) = conn
            .query_row(
                "SELECT officer_type, is_beneficial_owner, person_customer_id IS NOT NULL
                 FROM CompanyOfficer",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(officer_type, "UBO");
        assert!(beneficial);
        assert!(linked);
    }

    #[test]
    fn second_identifier_of_a_type_is_skipped() {
        let scenario = Scenario::from_value(&json!({
            "scenario_id": "S-passports",
            "entities": [
                {"entity_id": "P1", "entity_type": "person", "name": "Ann Lee",
                 "identifiers": [
                    {"id_type": "passport", "id_number": "X1234567"},
                    {"id_type": "passport", "id_number": "Y7654321"}
                 ]}
            ]
        }))
        .unwrap();
        let mut conn = db();
        let report = load(&mut conn, &scenario, false);

        let batch = report.batch(Category::Identifiers).unwrap();
        assert_eq!(batch.inserted, 1);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.error_count(), 0);
        let kept: String = conn
            .query_row("SELECT id_number FROM CustomerIdentifier", [], |r| r.get(0))
            .unwrap();
        assert_eq!(kept, "X1234567");
    }

    #[test]
    fn officers_of_a_failed_company_are_dropped() {
        let scenario = Scenario::from_value(&json!({
            "entities": [
                {"entity_id": "C1", "entity_type": "company", "name": "Acme",
                 "officers": [{"name": "Jo Bloggs", "role": "director"}]}
            ]
        }))
        .unwrap();
        let mut conn = db();
        conn.execute_batch("DROP TABLE CustomerCompany").unwrap();
        let report = load(&mut conn, &scenario, false);

        assert_eq!(report.count(Category::Customers), 1);
        assert_eq!(report.aborted(), vec![Category::Companies]);
        assert_eq!(report.count(Category::Officers), 0);
        assert_eq!(report.dropped_refs(Category::Officers), vec!["C1/officers[0]"]);
    }

    #[test]
    fn ground_truth_columns_follow_the_gate() {
        let scenario = Scenario::from_value(&json!({
            "scenario_id": "S-gt",
            "typology": "structuring",
            "entities": [{"entity_id": "E1", "name": "Ann Lee"}],
            "accounts": [{"account_id": "A1", "owner_id": "E1"}],
            "transactions": [{"transaction_id": "T1", "from_account_id": "A1", "amount": 9900,
                              "_ground_truth": {"is_suspicious": true}}]
        }))
        .unwrap();

        let mut blind = db();
        load(&mut blind, &scenario, false);
        let hidden: Option<bool> = blind
            .query_row("SELECT _is_suspicious FROM \"Transaction\"", [], |r| r.get(0))
            .unwrap();
        assert_eq!(hidden, None);

        let mut labelled = db();
        load(&mut labelled, &scenario, true);
        let (flag, typology, scenario_id): (bool, String, String) = labelled
            .query_row(
                "SELECT _is_suspicious, _typology, _scenario_id FROM \"Transaction\"",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert!(flag);
        assert_eq!(typology, "structuring");
        assert_eq!(scenario_id, "S-gt");
    }

    #[test]
    fn alerts_link_loaded_transactions() {
        let scenario = Scenario::from_value(&json!({
            "entities": [{"entity_id": "E1", "name": "Ann Lee"}],
            "accounts": [{"account_id": "A1", "owner_id": "E1"}],
            "transactions": [{"transaction_id": "T1", "from_account_id": "A1", "amount": 9900}],
            "alerts": [
                {"alert_id": "AL1", "account_id": "A1", "severity": "high", "transaction_ids": ["T1", "T9"]},
                {"alert_id": "AL2", "account_id": "NOPE"}
            ]
        }))
        .unwrap();
        let mut conn = db();
        let report = load(&mut conn, &scenario, false);

        assert_eq!(report.count(Category::Alerts), 1);
        assert_eq!(report.dropped_refs(Category::Alerts), vec!["AL2"]);
        let (links, owner_set): (i64, bool) = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM AlertTransaction),
                        (SELECT customer_id IS NOT NULL FROM Alert)",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(links, 1);
        assert!(owner_set);
    }
}
