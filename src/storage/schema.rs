//! Relational bank schema bootstrap
//!
//! Idempotent: every object is created with `IF NOT EXISTS`, so bootstrap can
//! run before each ingestion. Enumerated columns carry `CHECK` constraints
//! generated from the domain enums, which keeps the schema and the normalizer
//! from drifting apart.

use super::error::StorageResult;
use crate::normalize::{
    check_clause, AccountStatus, AccountType, AddressType, AlertSeverity, AlertStatus, Channel,
    CounterpartyType, Currency, CustomerSegment, CustomerStatus, CustomerType, Direction, IdType,
    LegalForm, OfficerType, OwnershipType, RelationshipType, RiskRating, TxnType,
};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Tables written by the loader, in dependency order
pub const TABLES: &[&str] = &[
    "Customer",
    "CustomerPerson",
    "CustomerCompany",
    "CustomerAddress",
    "CustomerIdentifier",
    "CompanyOfficer",
    "Account",
    "AccountOwnership",
    "Counterparty",
    "Transaction",
    "CustomerRelationship",
    "Alert",
    "AlertTransaction",
];

const GROUND_TRUTH_COLUMNS: &str = r#"
                _is_suspicious INTEGER,
                _typology TEXT,
                _scenario_id TEXT"#;

fn ddl() -> String {
    format!(
        r#"
            CREATE TABLE IF NOT EXISTS Customer (
                customer_id TEXT PRIMARY KEY,
                customer_type TEXT NOT NULL {customer_type},
                status TEXT NOT NULL {customer_status},
                risk_rating TEXT NOT NULL {risk_rating},
                segment TEXT NOT NULL {segment},
                display_name TEXT,
                onboarding_date TEXT NOT NULL,
                source_ref TEXT NOT NULL,
                ingest_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,{gt}
            );

            CREATE TABLE IF NOT EXISTS CustomerPerson (
                customer_id TEXT PRIMARY KEY REFERENCES Customer(customer_id),
                first_name TEXT,
                middle_name TEXT,
                last_name TEXT,
                full_name TEXT,
                date_of_birth TEXT,
                nationality TEXT,
                occupation TEXT,
                employer TEXT,
                is_pep INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS CustomerCompany (
                customer_id TEXT PRIMARY KEY REFERENCES Customer(customer_id),
                legal_name TEXT NOT NULL,
                legal_form TEXT NOT NULL {legal_form},
                registration_number TEXT,
                incorporation_date TEXT,
                jurisdiction TEXT,
                industry TEXT
            );

            CREATE TABLE IF NOT EXISTS CustomerAddress (
                address_id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL REFERENCES Customer(customer_id),
                address_type TEXT NOT NULL {address_type},
                line1 TEXT,
                line2 TEXT,
                city TEXT,
                state TEXT,
                postal_code TEXT,
                country TEXT,
                is_primary INTEGER NOT NULL DEFAULT 1,
                UNIQUE (customer_id, address_type)
            );

            CREATE TABLE IF NOT EXISTS CustomerIdentifier (
                identifier_id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL REFERENCES Customer(customer_id),
                id_type TEXT NOT NULL {id_type},
                id_number TEXT NOT NULL,
                issuing_country TEXT,
                issue_date TEXT,
                expiry_date TEXT,
                is_primary INTEGER NOT NULL DEFAULT 0,
                verified INTEGER NOT NULL DEFAULT 0,
                UNIQUE (customer_id, id_type)
            );

            CREATE TABLE IF NOT EXISTS CompanyOfficer (
                officer_id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL REFERENCES Customer(customer_id),
                person_customer_id TEXT REFERENCES Customer(customer_id),
                full_name TEXT,
                officer_type TEXT NOT NULL {officer_type},
                ownership_percentage REAL,
                is_beneficial_owner INTEGER NOT NULL DEFAULT 0,
                nationality TEXT,
                date_of_birth TEXT,
                appointed_date TEXT,
                source_ref TEXT NOT NULL,
                ingest_key TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS Account (
                account_id TEXT PRIMARY KEY,
                account_number TEXT,
                account_type TEXT NOT NULL {account_type},
                currency TEXT NOT NULL {currency},
                status TEXT NOT NULL {account_status},
                open_date TEXT NOT NULL,
                close_date TEXT,
                current_balance REAL NOT NULL DEFAULT 0,
                branch TEXT,
                source_ref TEXT NOT NULL,
                ingest_key TEXT NOT NULL UNIQUE,{gt}
            );

            CREATE TABLE IF NOT EXISTS AccountOwnership (
                ownership_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES Account(account_id),
                customer_id TEXT NOT NULL REFERENCES Customer(customer_id),
                ownership_type TEXT NOT NULL {ownership_type},
                ownership_percentage REAL NOT NULL,
                UNIQUE (account_id, customer_id)
            );

            CREATE TABLE IF NOT EXISTS Counterparty (
                counterparty_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                counterparty_type TEXT NOT NULL {counterparty_type},
                country TEXT,
                bank_name TEXT,
                ingest_key TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS "Transaction" (
                txn_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES Account(account_id),
                counterparty_id TEXT REFERENCES Counterparty(counterparty_id),
                counterparty_account_id TEXT REFERENCES Account(account_id),
                direction TEXT NOT NULL {direction},
                txn_type TEXT NOT NULL {txn_type},
                channel TEXT NOT NULL {channel},
                amount REAL NOT NULL,
                currency TEXT NOT NULL {txn_currency},
                txn_timestamp TEXT NOT NULL,
                description TEXT,
                source_ref TEXT NOT NULL,
                ingest_key TEXT NOT NULL UNIQUE,{gt}
            );

            CREATE TABLE IF NOT EXISTS CustomerRelationship (
                relationship_id TEXT PRIMARY KEY,
                from_customer_id TEXT NOT NULL REFERENCES Customer(customer_id),
                to_customer_id TEXT NOT NULL REFERENCES Customer(customer_id),
                relationship_type TEXT NOT NULL {relationship_type},
                ownership_percentage REAL,
                start_date TEXT,
                source_ref TEXT NOT NULL,
                ingest_key TEXT NOT NULL UNIQUE,{gt}
            );

            CREATE TABLE IF NOT EXISTS Alert (
                alert_id TEXT PRIMARY KEY,
                account_id TEXT REFERENCES Account(account_id),
                customer_id TEXT REFERENCES Customer(customer_id),
                alert_type TEXT,
                severity TEXT NOT NULL {severity},
                score REAL,
                status TEXT NOT NULL {alert_status},
                created_at TEXT NOT NULL,
                narrative TEXT,
                sar_filed INTEGER NOT NULL DEFAULT 0,
                source_ref TEXT NOT NULL,
                ingest_key TEXT NOT NULL UNIQUE,{gt}
            );

            CREATE TABLE IF NOT EXISTS AlertTransaction (
                alert_id TEXT NOT NULL REFERENCES Alert(alert_id),
                txn_id TEXT NOT NULL REFERENCES "Transaction"(txn_id),
                role TEXT NOT NULL DEFAULT 'TRIGGER' CHECK (role IN ('TRIGGER', 'SUPPORTING')),
                PRIMARY KEY (alert_id, txn_id)
            );

            CREATE TABLE IF NOT EXISTS IngestRun (
                run_id TEXT PRIMARY KEY,
                scenario_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                include_ground_truth INTEGER NOT NULL,
                counts_json TEXT NOT NULL,
                graph_status TEXT NOT NULL CHECK (graph_status IN ('PENDING', 'PROJECTED', 'FAILED')),
                graph_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_account_ownership_customer
                ON AccountOwnership(customer_id);
            CREATE INDEX IF NOT EXISTS idx_transaction_account
                ON "Transaction"(account_id, txn_timestamp);
            CREATE INDEX IF NOT EXISTS idx_relationship_from
                ON CustomerRelationship(from_customer_id);
            CREATE INDEX IF NOT EXISTS idx_relationship_to
                ON CustomerRelationship(to_customer_id);
            CREATE INDEX IF NOT EXISTS idx_officer_company
                ON CompanyOfficer(company_id);
            CREATE INDEX IF NOT EXISTS idx_ingest_run_scenario
                ON IngestRun(scenario_id, graph_status);
            "#,
        gt = GROUND_TRUTH_COLUMNS,
        customer_type = check_clause::<CustomerType>("customer_type"),
        customer_status = check_clause::<CustomerStatus>("status"),
        risk_rating = check_clause::<RiskRating>("risk_rating"),
        segment = check_clause::<CustomerSegment>("segment"),
        legal_form = check_clause::<LegalForm>("legal_form"),
        address_type = check_clause::<AddressType>("address_type"),
        id_type = check_clause::<IdType>("id_type"),
        officer_type = check_clause::<OfficerType>("officer_type"),
        account_type = check_clause::<AccountType>("account_type"),
        currency = check_clause::<Currency>("currency"),
        account_status = check_clause::<AccountStatus>("status"),
        ownership_type = check_clause::<OwnershipType>("ownership_type"),
        counterparty_type = check_clause::<CounterpartyType>("counterparty_type"),
        direction = check_clause::<Direction>("direction"),
        txn_type = check_clause::<TxnType>("txn_type"),
        channel = check_clause::<Channel>("channel"),
        txn_currency = check_clause::<Currency>("currency"),
        relationship_type = check_clause::<RelationshipType>("relationship_type"),
        severity = check_clause::<AlertSeverity>("severity"),
        alert_status = check_clause::<AlertStatus>("status"),
    )
}

/// Create every table and index that does not exist yet
pub fn bootstrap(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(&ddl())?;
    Ok(())
}

/// Row count of every loader table
pub fn statistics(conn: &Connection) -> StorageResult<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    for table in TABLES {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))?;
        counts.insert((*table).to_string(), count);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        bootstrap(&conn).unwrap();
        let stats = statistics(&conn).unwrap();
        assert_eq!(stats.len(), TABLES.len());
        assert!(stats.values().all(|c| *c == 0));
    }

    #[test]
    fn check_constraints_reject_unknown_categories() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        let err = conn
            .execute(
                "INSERT INTO Customer (customer_id, customer_type, status, risk_rating, segment,
                     onboarding_date, source_ref, ingest_key, created_at)
                 VALUES ('C1', 'PERSON', 'ACTIVE', 'SPICY', 'RETAIL', '2024-01-01', 'E1', 'k', 'now')",
                [],
            )
            .unwrap_err();
        assert_eq!(
            crate::storage::classify(&err),
            crate::storage::ErrorClass::Constraint
        );
    }
}
