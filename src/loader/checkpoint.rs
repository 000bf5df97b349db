//! Partial-failure isolation
//!
//! Every category runs inside its own named savepoint nested in the scenario
//! transaction, and every record inside a further savepoint nested in that.
//! A bad record rolls back alone; a batch that cannot even prepare its
//! statements rolls back as a whole and reports zero. Only connection-class
//! errors escape, because then the outer transaction is gone anyway.
//!
//! The registry's staging layers follow the savepoints one for one, so an id
//! mapping never outlives the row it describes.

use super::context::ScenarioContext;
use super::outcome::{BatchReport, Category, RecordError, RecordOutcome, Written};
use crate::scenario::RejectedRecord;
use crate::storage::{is_fatal, truncate_message, StorageError, StorageResult};
use rusqlite::{Connection, DropBehavior, Transaction};
use tracing::{debug, warn};

use super::outcome::MAX_MESSAGE_LEN;

/// One unit of work in a batch
pub(crate) struct BatchItem<'a, R> {
    pub source_ref: String,
    pub record: Result<R, &'a RejectedRecord>,
}

impl<'a, R> BatchItem<'a, R> {
    pub fn ready(source_ref: impl Into<String>, record: R) -> Self {
        Self {
            source_ref: source_ref.into(),
            record: Ok(record),
        }
    }

    pub fn rejected(rejected: &'a RejectedRecord) -> Self {
        Self {
            source_ref: rejected.display_ref(),
            record: Err(rejected),
        }
    }
}

/// Load one category under its own checkpoint
///
/// `statements` are prepared before any record runs; a failure there aborts
/// the batch. `load_one` runs once per ready item inside a per-record
/// savepoint. Returns `Err` only for connection-class failures.
pub(crate) fn run_batch<R>(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    category: Category,
    statements: &[&str],
    items: Vec<BatchItem<'_, R>>,
    mut load_one: impl FnMut(&Connection, &mut ScenarioContext, &R) -> Result<Written, RecordError>,
) -> StorageResult<BatchReport> {
    let mut report = BatchReport::new(category);
    let mut batch = tx.savepoint_with_name(category.savepoint_name())?;
    batch.set_drop_behavior(DropBehavior::Rollback);
    ctx.registry.checkpoint();

    for sql in statements {
        let prepared = batch.prepare_cached(sql).map(|_| ());
        if let Err(e) = prepared {
            ctx.registry.discard();
            if is_fatal(&e) {
                return Err(e.into());
            }
            let reason = truncate_message(&e.to_string(), MAX_MESSAGE_LEN);
            warn!(
                category = %category,
                records = items.len(),
                error = %reason,
                "batch aborted, rolling back category"
            );
            batch.finish()?;
            report.abort(&reason);
            return Ok(report);
        }
    }

    for item in &items {
        let outcome = match &item.record {
            Err(rejected) => {
                RecordOutcome::Failed(RecordError::InvalidValue(rejected.reason.clone()))
            }
            Ok(record) => {
                ctx.registry.checkpoint();
                let mut unit = batch.savepoint()?;
                unit.set_drop_behavior(DropBehavior::Rollback);
                match load_one(&*unit, ctx, record) {
                    Ok(written) => {
                        unit.commit()?;
                        ctx.registry.release();
                        RecordOutcome::from(Ok(written))
                    }
                    Err(RecordError::Connection(e)) => {
                        ctx.registry.discard();
                        ctx.registry.discard();
                        return Err(StorageError::Database(e));
                    }
                    Err(e) => {
                        unit.finish()?;
                        ctx.registry.discard();
                        RecordOutcome::from(Err(e))
                    }
                }
            }
        };
        log_outcome(category, &item.source_ref, &outcome);
        report.record(&item.source_ref, outcome);
    }

    batch.commit()?;
    ctx.registry.release();
    debug!(
        category = %category,
        inserted = report.inserted,
        skipped = report.skipped,
        dropped = report.dropped.len(),
        failed = report.failed.len(),
        "batch committed"
    );
    Ok(report)
}

fn log_outcome(category: Category, source_ref: &str, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Dropped(e) => {
            warn!(category = %category, source_ref, reason = %e, "dropped record");
        }
        RecordOutcome::Failed(e) => {
            let error = truncate_message(&e.to_string(), MAX_MESSAGE_LEN);
            warn!(category = %category, source_ref, error = %error, "record failed");
        }
        RecordOutcome::Skipped => {
            debug!(category = %category, source_ref, "record already present");
        }
        RecordOutcome::Inserted => {}
    }
}
