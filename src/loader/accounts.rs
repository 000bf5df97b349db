//! Accounts and account ownership

use super::checkpoint::{run_batch, BatchItem};
use super::context::ScenarioContext;
use super::outcome::{BatchReport, Category, RecordError, Written};
use super::rows::{date_text, upsert_keyed, written};
use crate::normalize::{normalize, Categorical, OwnershipType};
use crate::registry::IdKind;
use crate::scenario::{AccountRecord, Scenario};
use crate::storage::StorageResult;
use rusqlite::{params, Connection, Transaction};

const ACCOUNT_LOOKUP: &str = "SELECT account_id FROM Account WHERE ingest_key = ?1";

const ACCOUNT_INSERT: &str = "
    INSERT INTO Account (account_id, account_number, account_type, currency, status, open_date,
                         close_date, current_balance, branch, source_ref, ingest_key,
                         _is_suspicious, _typology, _scenario_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
    ON CONFLICT DO NOTHING";

const OWNERSHIP_INSERT: &str = "
    INSERT INTO AccountOwnership (ownership_id, account_id, customer_id, ownership_type,
                                  ownership_percentage)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT DO NOTHING";

pub(crate) fn load_accounts(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .accounts
        .iter()
        .map(|parsed| match parsed {
            Ok(account) => BatchItem::ready(account.source_ref.clone(), account),
            Err(rejected) => BatchItem::rejected(rejected),
        })
        .collect();
    run_batch(
        tx,
        ctx,
        Category::Accounts,
        &[ACCOUNT_LOOKUP, ACCOUNT_INSERT],
        items,
        load_account,
    )
}

fn load_account(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    account: &&AccountRecord,
) -> Result<Written, RecordError> {
    // An account without a resolvable owner has no place in the schema
    let owner = account.owner_ref.as_deref();
    if owner
        .and_then(|r| ctx.registry.resolve(IdKind::Customer, r))
        .is_none()
    {
        return Err(RecordError::unresolved(IdKind::Customer, owner));
    }

    let defaults = ctx.defaults;
    let account_type = normalize(account.account_type.as_deref(), defaults.account_type);
    let currency = normalize(account.currency.as_deref(), defaults.currency);
    let status = normalize(account.status.as_deref(), defaults.account_status);
    let open_date = account.open_date.unwrap_or_else(|| ctx.load_date());
    let gt = ctx.ground_truth(&account.ground_truth, IdKind::Account, &account.source_ref);

    let (written, account_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Account,
        &account.source_ref,
        ACCOUNT_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(ACCOUNT_INSERT)?.execute(params![
                id,
                account.account_number,
                account_type.as_str(),
                currency.as_str(),
                status.as_str(),
                date_text(Some(open_date)),
                date_text(account.close_date),
                account.balance.unwrap_or(0.0),
                account.branch,
                account.source_ref,
                key,
                gt.is_suspicious,
                gt.typology,
                gt.scenario_id,
            ])
        },
    )?;
    ctx.registry
        .register(IdKind::Account, &account.source_ref, account_id);
    Ok(written)
}

/// One ownership row to write
#[derive(Debug, Clone)]
pub(crate) struct OwnershipRow<'a> {
    pub account_ref: &'a str,
    pub customer_ref: &'a str,
    pub ownership_type: OwnershipType,
    pub percentage: f64,
}

/// PRIMARY for the owner, JOINT for each co-owner, shares split equally
pub(crate) fn ownership_rows(account: &AccountRecord) -> Vec<OwnershipRow<'_>> {
    let Some(owner) = account.owner_ref.as_deref() else {
        return Vec::new();
    };
    let co_owners: Vec<&str> = account
        .co_owner_refs
        .iter()
        .map(String::as_str)
        .filter(|c| *c != owner)
        .collect();
    let share = 100.0 / (co_owners.len() + 1) as f64;

    let mut rows = vec![OwnershipRow {
        account_ref: &account.source_ref,
        customer_ref: owner,
        ownership_type: OwnershipType::Primary,
        percentage: share,
    }];
    rows.extend(co_owners.into_iter().map(|c| OwnershipRow {
        account_ref: &account.source_ref,
        customer_ref: c,
        ownership_type: OwnershipType::Joint,
        percentage: share,
    }));
    rows
}

pub(crate) fn load_ownerships(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .accounts
        .iter()
        .flatten()
        .filter(|a| ctx.registry.resolve(IdKind::Account, &a.source_ref).is_some())
        .flat_map(ownership_rows)
        .map(|row| {
            BatchItem::ready(format!("{}/{}", row.account_ref, row.customer_ref), row)
        })
        .collect();
    run_batch(
        tx,
        ctx,
        Category::Ownerships,
        &[OWNERSHIP_INSERT],
        items,
        load_ownership,
    )
}

fn load_ownership(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    row: &OwnershipRow<'_>,
) -> Result<Written, RecordError> {
    let account_id = ctx
        .registry
        .resolve(IdKind::Account, row.account_ref)
        .ok_or_else(|| RecordError::unresolved(IdKind::Account, Some(row.account_ref)))?
        .to_string();
    let customer_id = ctx
        .registry
        .resolve(IdKind::Customer, row.customer_ref)
        .ok_or_else(|| RecordError::unresolved(IdKind::Customer, Some(row.customer_ref)))?
        .to_string();
    let ownership_id = ctx.registry.generate(IdKind::Ownership);

    let rows = conn.prepare_cached(OWNERSHIP_INSERT)?.execute(params![
        ownership_id,
        account_id,
        customer_id,
        row.ownership_type.as_str(),
        row.percentage,
    ])?;
    Ok(written(rows))
}
