//! Counterparties and transactions
//!
//! Scenario transactions name both ends by informal account id, but only one
//! of them has to be an account we hold. The booking side and the direction
//! follow from which ends resolve.

use super::checkpoint::{run_batch, BatchItem};
use super::context::ScenarioContext;
use super::outcome::{BatchReport, Category, RecordError, Written};
use super::rows::{timestamp_text, upsert_keyed};
use crate::normalize::{normalize, Categorical, CounterpartyType, Direction};
use crate::registry::IdKind;
use crate::scenario::{Scenario, TransactionRecord};
use crate::storage::StorageResult;
use rusqlite::{params, Connection, Transaction};
use std::collections::HashSet;
use tracing::debug;

const COUNTERPARTY_LOOKUP: &str = "SELECT counterparty_id FROM Counterparty WHERE ingest_key = ?1";

const COUNTERPARTY_INSERT: &str = "
    INSERT INTO Counterparty (counterparty_id, name, counterparty_type, country, bank_name,
                              ingest_key)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT DO NOTHING";

const TRANSACTION_LOOKUP: &str = "SELECT txn_id FROM \"Transaction\" WHERE ingest_key = ?1";

const TRANSACTION_INSERT: &str = "
    INSERT INTO \"Transaction\" (txn_id, account_id, counterparty_id, counterparty_account_id,
                               direction, txn_type, channel, amount, currency, txn_timestamp,
                               description, source_ref, ingest_key,
                               _is_suspicious, _typology, _scenario_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
    ON CONFLICT DO NOTHING";

/// Where a transaction is booked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub account_id: String,
    pub direction: Direction,
    /// Our other account, when both ends are held here
    pub counterparty_account_id: Option<String>,
}

/// Book on the source account when it resolves, else on the destination
///
/// Source only or both ends: DEBIT on the source, and with both ends the
/// destination becomes the counterparty account. Destination only: CREDIT.
pub fn infer_booking(source: Option<&str>, destination: Option<&str>) -> Option<Booking> {
    match (source, destination) {
        (Some(src), dst) => Some(Booking {
            account_id: src.to_string(),
            direction: Direction::Debit,
            counterparty_account_id: dst.map(str::to_string),
        }),
        (None, Some(dst)) => Some(Booking {
            account_id: dst.to_string(),
            direction: Direction::Credit,
            counterparty_account_id: None,
        }),
        (None, None) => None,
    }
}

pub(crate) fn load_counterparties(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for txn in scenario.transactions.iter().flatten() {
        let Some(name) = txn.counterparty_name.as_deref() else {
            continue;
        };
        if seen.insert(name) {
            items.push(BatchItem::ready(name, txn));
        } else {
            debug!(
                counterparty = name,
                transaction = %txn.source_ref,
                "reusing counterparty"
            );
        }
    }
    run_batch(
        tx,
        ctx,
        Category::Counterparties,
        &[COUNTERPARTY_LOOKUP, COUNTERPARTY_INSERT],
        items,
        load_counterparty,
    )
}

fn load_counterparty(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    txn: &&TransactionRecord,
) -> Result<Written, RecordError> {
    let Some(name) = txn.counterparty_name.as_deref() else {
        return Err(RecordError::InvalidValue("counterparty without a name".into()));
    };
    let counterparty_type: CounterpartyType =
        normalize(txn.counterparty_type.as_deref(), ctx.defaults.counterparty_type);

    let (written, counterparty_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Counterparty,
        name,
        COUNTERPARTY_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(COUNTERPARTY_INSERT)?.execute(params![
                id,
                name,
                counterparty_type.as_str(),
                txn.counterparty_country,
                txn.counterparty_bank,
                key,
            ])
        },
    )?;
    ctx.registry
        .register(IdKind::Counterparty, name, counterparty_id);
    Ok(written)
}

pub(crate) fn load_transactions(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .transactions
        .iter()
        .map(|parsed| match parsed {
            Ok(txn) => BatchItem::ready(txn.source_ref.clone(), txn),
            Err(rejected) => BatchItem::rejected(rejected),
        })
        .collect();
    run_batch(
        tx,
        ctx,
        Category::Transactions,
        &[TRANSACTION_LOOKUP, TRANSACTION_INSERT],
        items,
        load_transaction,
    )
}

fn load_transaction(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    txn: &&TransactionRecord,
) -> Result<Written, RecordError> {
    let resolve = |r: &Option<String>| {
        r.as_deref()
            .and_then(|r| ctx.registry.resolve(IdKind::Account, r))
    };
    let booking = infer_booking(resolve(&txn.from_account), resolve(&txn.to_account))
        .ok_or_else(|| {
            RecordError::unresolved(
                IdKind::Account,
                txn.from_account.as_deref().or(txn.to_account.as_deref()),
            )
        })?;

    let counterparty_id = txn
        .counterparty_name
        .as_deref()
        .and_then(|name| ctx.registry.resolve(IdKind::Counterparty, name))
        .map(str::to_string);
    let defaults = ctx.defaults;
    let txn_type = normalize(txn.txn_type.as_deref(), defaults.txn_type);
    let channel = normalize(txn.channel.as_deref(), defaults.channel);
    let currency = normalize(txn.currency.as_deref(), defaults.currency);
    let timestamp = timestamp_text(txn.timestamp.unwrap_or(ctx.loaded_at));
    let gt = ctx.ground_truth(&txn.ground_truth, IdKind::Transaction, &txn.source_ref);

    let (written, txn_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Transaction,
        &txn.source_ref,
        TRANSACTION_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(TRANSACTION_INSERT)?.execute(params![
                id,
                booking.account_id,
                counterparty_id,
                booking.counterparty_account_id,
                booking.direction.as_str(),
                txn_type.as_str(),
                channel.as_str(),
                txn.amount,
                currency.as_str(),
                timestamp,
                txn.description,
                txn.source_ref,
                key,
                gt.is_suspicious,
                gt.typology,
                gt.scenario_id,
            ])
        },
    )?;
    ctx.registry
        .register(IdKind::Transaction, &txn.source_ref, txn_id);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_only_is_a_credit() {
        let booking = infer_booking(None, Some("A2")).unwrap();
        assert_eq!(booking.account_id, "A2");
        assert_eq!(booking.direction, Direction::Credit);
        assert_eq!(booking.counterparty_account_id, None);
    }

    #[test]
    fn source_only_is_a_debit() {
        let booking = infer_booking(Some("A1"), None).unwrap();
        assert_eq!(booking.account_id, "A1");
        assert_eq!(booking.direction, Direction::Debit);
    }

    #[test]
    fn both_ends_book_on_the_source() {
        let booking = infer_booking(Some("A1"), Some("A2")).unwrap();
        assert_eq!(booking.account_id, "A1");
        assert_eq!(booking.direction, Direction::Debit);
        assert_eq!(booking.counterparty_account_id.as_deref(), Some("A2"));
    }

    #[test]
    fn neither_end_cannot_be_booked() {
        assert_eq!(infer_booking(None, None), None);
    }
}
