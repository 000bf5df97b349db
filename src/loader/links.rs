//! Customer relationships and alerts

use super::checkpoint::{run_batch, BatchItem};
use super::context::ScenarioContext;
use super::outcome::{BatchReport, Category, RecordError, Written};
use super::rows::{date_text, query_id, timestamp_text, upsert_keyed};
use crate::normalize::{normalize, AlertStatus, Categorical};
use crate::registry::IdKind;
use crate::scenario::{AlertRecord, RelationshipRecord, Scenario};
use crate::storage::StorageResult;
use rusqlite::{params, Connection, Transaction};
use tracing::debug;

const RELATIONSHIP_LOOKUP: &str =
    "SELECT relationship_id FROM CustomerRelationship WHERE ingest_key = ?1";

const RELATIONSHIP_INSERT: &str = "
    INSERT INTO CustomerRelationship (relationship_id, from_customer_id, to_customer_id,
                                      relationship_type, ownership_percentage, start_date,
                                      source_ref, ingest_key,
                                      _is_suspicious, _typology, _scenario_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT DO NOTHING";

const ALERT_LOOKUP: &str = "SELECT alert_id FROM Alert WHERE ingest_key = ?1";

const ALERT_INSERT: &str = "
    INSERT INTO Alert (alert_id, account_id, customer_id, alert_type, severity, score, status,
                       created_at, narrative, sar_filed, source_ref, ingest_key,
                       _is_suspicious, _typology, _scenario_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
    ON CONFLICT DO NOTHING";

const ALERT_TRANSACTION_INSERT: &str = "
    INSERT INTO AlertTransaction (alert_id, txn_id, role)
    VALUES (?1, ?2, 'TRIGGER')
    ON CONFLICT DO NOTHING";

/// Primary owner of an account, used when an alert names only the account
const PRIMARY_OWNER: &str = "
    SELECT customer_id FROM AccountOwnership
    WHERE account_id = ?1 AND ownership_type = 'PRIMARY'
    LIMIT 1";

pub(crate) fn load_relationships(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .relationships
        .iter()
        .map(|parsed| match parsed {
            Ok(rel) => BatchItem::ready(rel.source_ref.clone(), rel),
            Err(rejected) => BatchItem::rejected(rejected),
        })
        .collect();
    run_batch(
        tx,
        ctx,
        Category::Relationships,
        &[RELATIONSHIP_LOOKUP, RELATIONSHIP_INSERT],
        items,
        load_relationship,
    )
}

fn load_relationship(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    rel: &&RelationshipRecord,
) -> Result<Written, RecordError> {
    let endpoint = |r: &Option<String>| -> Result<String, RecordError> {
        r.as_deref()
            .and_then(|r| ctx.registry.resolve(IdKind::Customer, r))
            .map(str::to_string)
            .ok_or_else(|| RecordError::unresolved(IdKind::Customer, r.as_deref()))
    };
    let from_id = endpoint(&rel.from_ref)?;
    let to_id = endpoint(&rel.to_ref)?;
    let relationship_type =
        normalize(rel.relationship_type.as_deref(), ctx.defaults.relationship_type);
    let gt = ctx.ground_truth(&rel.ground_truth, IdKind::Relationship, &rel.source_ref);

    let (written, relationship_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Relationship,
        &rel.source_ref,
        RELATIONSHIP_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(RELATIONSHIP_INSERT)?.execute(params![
                id,
                from_id,
                to_id,
                relationship_type.as_str(),
                rel.ownership_percentage,
                date_text(rel.start_date),
                rel.source_ref,
                key,
                gt.is_suspicious,
                gt.typology,
                gt.scenario_id,
            ])
        },
    )?;
    ctx.registry
        .register(IdKind::Relationship, &rel.source_ref, relationship_id);
    Ok(written)
}

pub(crate) fn load_alerts(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .alerts
        .iter()
        .map(|parsed| match parsed {
            Ok(alert) => BatchItem::ready(alert.source_ref.clone(), alert),
            Err(rejected) => BatchItem::rejected(rejected),
        })
        .collect();
    run_batch(
        tx,
        ctx,
        Category::Alerts,
        &[ALERT_LOOKUP, ALERT_INSERT, ALERT_TRANSACTION_INSERT, PRIMARY_OWNER],
        items,
        load_alert,
    )
}

fn load_alert(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    alert: &&AlertRecord,
) -> Result<Written, RecordError> {
    let account_id = alert
        .account_ref
        .as_deref()
        .and_then(|r| ctx.registry.resolve(IdKind::Account, r))
        .map(str::to_string);
    let mut customer_id = alert
        .customer_ref
        .as_deref()
        .and_then(|r| ctx.registry.resolve(IdKind::Customer, r))
        .map(str::to_string);
    if customer_id.is_none() {
        if let Some(account_id) = &account_id {
            customer_id = query_id(conn, PRIMARY_OWNER, account_id)?;
        }
    }
    if account_id.is_none() && customer_id.is_none() {
        return Err(RecordError::unresolved(
            IdKind::Account,
            alert.account_ref.as_deref().or(alert.customer_ref.as_deref()),
        ));
    }

    let defaults = ctx.defaults;
    let severity = normalize(alert.severity.as_deref(), defaults.alert_severity);
    let status = if alert.sar_filed && alert.status.is_none() {
        AlertStatus::SarFiled
    } else {
        normalize(alert.status.as_deref(), defaults.alert_status)
    };
    let created_at = timestamp_text(alert.created_at.unwrap_or(ctx.loaded_at));
    let gt = ctx.ground_truth(&alert.ground_truth, IdKind::Alert, &alert.source_ref);

    let (written, alert_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Alert,
        &alert.source_ref,
        ALERT_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(ALERT_INSERT)?.execute(params![
                id,
                account_id,
                customer_id,
                alert.alert_type,
                severity.as_str(),
                alert.score,
                status.as_str(),
                created_at,
                alert.narrative,
                alert.sar_filed,
                alert.source_ref,
                key,
                gt.is_suspicious,
                gt.typology,
                gt.scenario_id,
            ])
        },
    )?;

    for txn_ref in &alert.transaction_refs {
        match ctx.registry.resolve(IdKind::Transaction, txn_ref) {
            Some(txn_id) => {
                conn.prepare_cached(ALERT_TRANSACTION_INSERT)?
                    .execute(params![alert_id, txn_id])?;
            }
            None => debug!(
                alert = %alert.source_ref,
                transaction = %txn_ref,
                "alert references an unloaded transaction"
            ),
        }
    }

    ctx.registry.register(IdKind::Alert, &alert.source_ref, alert_id);
    Ok(written)
}
