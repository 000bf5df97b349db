//! Record- and category-level failure isolation
//!
//! Run with: `cargo test --test partial_failure`

mod common;

use common::TestEnv;
use rand::Rng;
use scenario_ingest::Category;
use serde_json::{json, Value};

#[test]
fn one_malformed_account_does_not_block_the_rest() {
    let env = TestEnv::new();
    let outcome = env.ingest(json!({
        "scenario_id": "S-partial",
        "entities": [{"entity_id": "E1", "name": "Ann Lee"}],
        "accounts": [
            {"account_id": "A1", "owner_id": "E1", "open_date": "2020-01-01"},
            {"account_id": "A2", "owner_id": "E1", "open_date": "2020-02-01"},
            {"account_id": "A3", "owner_id": "E1", "open_date": "2020-03-01"},
            {"account_id": "BAD", "owner_id": "E1", "open_date": "the day after tomorrow"}
        ],
        "transactions": [
            {"transaction_id": "T1", "from_account_id": "A1", "amount": 10},
            {"transaction_id": "T2", "from_account_id": "A3", "amount": 20},
            {"transaction_id": "T3", "from_account_id": "BAD", "amount": 30}
        ]
    }));
    let report = &outcome.report;

    let accounts = report.batch(Category::Accounts).unwrap();
    assert_eq!(accounts.inserted, 3);
    assert_eq!(accounts.error_count(), 1);
    assert_eq!(accounts.failed[0].source_ref, "BAD");
    assert!(!accounts.is_aborted());

    assert_eq!(report.count(Category::Ownerships), 3);
    assert_eq!(report.count(Category::Transactions), 2);
    assert_eq!(report.dropped_refs(Category::Transactions), vec!["T3"]);
    assert_eq!(env.rows("Account"), 3);
}

#[test]
fn account_with_unknown_owner_is_dropped() {
    let env = TestEnv::new();
    let outcome = env.ingest(json!({
        "entities": [{"entity_id": "E1", "name": "Ann Lee"}],
        "accounts": [
            {"account_id": "A1", "owner_id": "E1"},
            {"account_id": "A2", "owner_id": "GHOST"}
        ]
    }));
    assert_eq!(outcome.report.count(Category::Accounts), 1);
    assert_eq!(outcome.report.dropped_refs(Category::Accounts), vec!["A2"]);
    assert_eq!(env.rows("Account"), 1);
}

#[test]
fn missing_table_aborts_only_its_category() {
    let env = TestEnv::new();
    env.inspect()
        .execute_batch("DROP TABLE CustomerRelationship")
        .unwrap();

    let outcome = env.ingest(common::two_entity_scenario());
    let report = &outcome.report;

    assert_eq!(report.aborted(), vec![Category::Relationships]);
    assert_eq!(report.count(Category::Relationships), 0);
    assert!(report.batch(Category::Relationships).unwrap().aborted.is_some());

    assert_eq!(report.count(Category::Customers), 2);
    assert_eq!(report.count(Category::Transactions), 2);
    assert_eq!(env.rows("Customer"), 2);
    assert_eq!(env.rows("Transaction"), 2);
}

#[test]
fn non_object_records_count_as_failures() {
    let env = TestEnv::new();
    let outcome = env.ingest(json!({
        "entities": [{"entity_id": "E1", "name": "Ann Lee"}, "E2", 42],
        "accounts": [{"account_id": "A1", "owner_id": "E1"}]
    }));
    let customers = outcome.report.batch(Category::Customers).unwrap();
    assert_eq!(customers.inserted, 1);
    assert_eq!(customers.error_count(), 2);
    assert_eq!(outcome.report.count(Category::Accounts), 1);
}

#[test]
fn invalid_document_is_rejected_before_loading() {
    let env = TestEnv::new();
    let result = scenario_ingest::Scenario::from_value(&json!({"entities": {"E1": {}}}));
    assert!(result.is_err());
    assert_eq!(env.rows("Customer"), 0);
}

/// Informal ids shaped like canonical ones never collide with generated ids
#[test]
fn randomized_informal_ids_stay_distinct() {
    let env = TestEnv::new();
    let mut rng = rand::thread_rng();

    let entity_ids: Vec<String> = (0..25)
        .map(|_| format!("C{:06}{:016X}", rng.gen_range(0..999_999), rng.gen::<u64>()))
        .collect();
    let entities: Vec<Value> = entity_ids
        .iter()
        .map(|id| json!({"entity_id": id, "name": format!("Person {}", id)}))
        .collect();
    let accounts: Vec<Value> = entity_ids
        .iter()
        .enumerate()
        .map(|(i, owner)| json!({"account_id": format!("A{}", i), "owner_id": owner}))
        .collect();

    let outcome = env.ingest(json!({
        "scenario_id": "S-random",
        "entities": entities,
        "accounts": accounts
    }));
    assert_eq!(outcome.report.count(Category::Customers), entity_ids.len());
    assert_eq!(outcome.report.count(Category::Accounts), entity_ids.len());

    let conn = env.inspect();
    let mut stmt = conn.prepare("SELECT customer_id FROM Customer").unwrap();
    let stored: Vec<String> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for id in &stored {
        assert!(!entity_ids.contains(id));
    }
}
