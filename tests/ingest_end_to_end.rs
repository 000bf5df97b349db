//! End-to-end ingestion into both stores
//!
//! Run with: `cargo test --test ingest_end_to_end`

mod common;

use common::{capture_warnings, two_entity_scenario, TestEnv};
use scenario_ingest::storage::GraphStatus;
use scenario_ingest::Category;
use serde_json::json;
use std::collections::HashSet;

#[test]
fn two_entities_two_accounts_three_transactions() {
    let env = TestEnv::new();
    let outcome = env.ingest(two_entity_scenario());
    let report = &outcome.report;

    assert_eq!(report.count(Category::Customers), 2);
    assert_eq!(report.count(Category::Accounts), 2);
    assert_eq!(report.count(Category::Ownerships), 2);
    assert_eq!(report.count(Category::Transactions), 2);
    assert_eq!(report.dropped_refs(Category::Transactions), vec!["T3"]);
    assert!(report.aborted().is_empty());

    assert_eq!(env.rows("Customer"), 2);
    assert_eq!(env.rows("Account"), 2);
    assert_eq!(env.rows("AccountOwnership"), 2);
    assert_eq!(env.rows("Transaction"), 2);
    assert_eq!(env.rows("Counterparty"), 1);
    assert_eq!(env.rows("CustomerRelationship"), 1);

    assert!(outcome.projected());
    let run = env.service.run(&outcome.run_id).unwrap().unwrap();
    assert_eq!(run.graph_status, GraphStatus::Projected);
    assert_eq!(run.counts["transactions"], 2);
}

#[test]
fn unresolved_transaction_is_logged_once_by_informal_id() {
    let env = TestEnv::new();
    let (outcome, lines) = capture_warnings(|| env.ingest(two_entity_scenario()));
    assert_eq!(outcome.report.count(Category::Transactions), 2);

    let warnings: Vec<&String> = lines.iter().filter(|l| l.contains("WARN")).collect();
    let naming_t3: Vec<&&String> = warnings.iter().filter(|l| l.contains("T3")).collect();
    assert_eq!(naming_t3.len(), 1, "warnings: {:#?}", warnings);
    assert!(naming_t3[0].contains("dropped record"));
    assert!(naming_t3[0].contains("transactions"));
}

#[test]
fn reingesting_inserts_nothing() {
    let env = TestEnv::new();
    env.ingest(two_entity_scenario());
    let tables = env.service.statistics().unwrap();
    let graph = env.service.graph().counts().unwrap();

    let again = env.ingest(two_entity_scenario());
    assert_eq!(again.report.total_inserted(), 0);
    assert!(again.report.total_skipped() > 0);
    assert!(again.report.batches.iter().all(|b| b.failed.is_empty()));
    assert!(again.report.aborted().is_empty());

    assert_eq!(env.service.statistics().unwrap(), tables);
    assert_eq!(env.service.graph().counts().unwrap(), graph);
}

#[test]
fn reingesting_a_document_without_an_id_inserts_nothing() {
    let env = TestEnv::new();
    let document = json!({
        "entities": [{"entity_id": "E1", "name": "Ann Lee"}],
        "accounts": [{"account_id": "A1", "owner_id": "E1"}]
    });

    let first = env.ingest(document.clone());
    assert_eq!(first.report.count(Category::Customers), 1);

    let second = env.ingest(document);
    assert_eq!(second.report.scenario_id, first.report.scenario_id);
    assert_eq!(second.report.total_inserted(), 0);
    assert_eq!(env.rows("Customer"), 1);
    assert_eq!(env.rows("Account"), 1);
}

#[test]
fn canonical_ids_never_echo_informal_ids() {
    let env = TestEnv::new();
    env.ingest(two_entity_scenario());
    let informal: HashSet<&str> = ["E1", "E2", "A1", "A2", "T1", "T2", "T3", "EXT-999"].into();

    let conn = env.inspect();
    for sql in [
        "SELECT customer_id FROM Customer",
        "SELECT account_id FROM Account",
        "SELECT txn_id FROM \"Transaction\"",
    ] {
        let mut stmt = conn.prepare(sql).unwrap();
        let ids: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!ids.is_empty());
        for id in &ids {
            assert!(!informal.contains(id.as_str()), "{} reused an informal id", id);
        }
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}

#[test]
fn direction_follows_the_resolvable_end() {
    let env = TestEnv::new();
    let outcome = env.ingest(json!({
        "scenario_id": "S-direction",
        "entities": [{"entity_id": "E1", "name": "Ann Lee"}],
        "accounts": [{"account_id": "A1", "owner_id": "E1"}],
        "transactions": [
            {"transaction_id": "IN", "from_account_id": "EXT-1", "to_account_id": "A1", "amount": 100},
            {"transaction_id": "OUT", "from_account_id": "A1", "to_account_id": "EXT-2", "amount": 50},
            {"transaction_id": "NONE", "from_account_id": "EXT-3", "to_account_id": "EXT-4", "amount": 1}
        ]
    }));
    assert_eq!(outcome.report.count(Category::Transactions), 2);
    assert_eq!(outcome.report.dropped_refs(Category::Transactions), vec!["NONE"]);

    let conn = env.inspect();
    let direction = |source_ref: &str| -> String {
        conn.query_row(
            "SELECT direction FROM \"Transaction\" WHERE source_ref = ?1",
            [source_ref],
            |r| r.get(0),
        )
        .unwrap()
    };
    assert_eq!(direction("IN"), "CREDIT");
    assert_eq!(direction("OUT"), "DEBIT");
}

#[test]
fn unknown_risk_rating_is_stored_as_default() {
    let env = TestEnv::with_config(|config| {
        config.normalization.risk_rating = scenario_ingest::normalize::RiskRating::Low;
    });
    env.ingest(json!({
        "entities": [{"entity_id": "E1", "name": "Ann Lee", "risk_rating": "EXTREMELY_SPICY"}]
    }));
    let stored: String = env
        .inspect()
        .query_row("SELECT risk_rating FROM Customer", [], |r| r.get(0))
        .unwrap();
    assert_eq!(stored, "LOW");
}

#[test]
fn ground_truth_needs_the_gate() {
    let blind = TestEnv::new();
    blind.ingest(two_entity_scenario());
    let hidden: i64 = blind
        .inspect()
        .query_row(
            "SELECT COUNT(*) FROM Customer WHERE _is_suspicious IS NOT NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(hidden, 0);

    let labelled = TestEnv::with_config(|config| config.include_ground_truth = true);
    labelled.ingest(two_entity_scenario());
    let (flagged, typology): (i64, String) = labelled
        .inspect()
        .query_row(
            "SELECT COUNT(*), MAX(_typology) FROM \"Transaction\" WHERE _is_suspicious = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(flagged, 2);
    assert_eq!(typology, "layering");
}

#[test]
fn scenario_file_round_trip() {
    let env = TestEnv::new();
    let path = env.dir.path().join("scenario.json");
    std::fs::write(&path, two_entity_scenario().to_string()).unwrap();
    let outcome = env.service.ingest_path(&path).unwrap();
    assert_eq!(outcome.report.scenario_id, "S-e2e");
    assert_eq!(outcome.counts()["customers"], 2);
}
