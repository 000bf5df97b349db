//! Per-record outcomes and per-batch reports

use crate::registry::IdKind;
use crate::storage::{classify, truncate_message, ErrorClass};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Longest error message kept in logs and reports
pub const MAX_MESSAGE_LEN: usize = 200;

/// Sub-entity categories, in load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Customers,
    Persons,
    Companies,
    Addresses,
    Identifiers,
    Officers,
    Accounts,
    Ownerships,
    Counterparties,
    Transactions,
    Relationships,
    Alerts,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Customers,
        Category::Persons,
        Category::Companies,
        Category::Addresses,
        Category::Identifiers,
        Category::Officers,
        Category::Accounts,
        Category::Ownerships,
        Category::Counterparties,
        Category::Transactions,
        Category::Relationships,
        Category::Alerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Customers => "customers",
            Category::Persons => "persons",
            Category::Companies => "companies",
            Category::Addresses => "addresses",
            Category::Identifiers => "identifiers",
            Category::Officers => "officers",
            Category::Accounts => "accounts",
            Category::Ownerships => "ownerships",
            Category::Counterparties => "counterparties",
            Category::Transactions => "transactions",
            Category::Relationships => "relationships",
            Category::Alerts => "alerts",
        }
    }

    /// Name of the checkpoint wrapping this category's batch
    pub fn savepoint_name(&self) -> String {
        format!("sp_{}", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single record did not produce a row
#[derive(Debug, Error)]
pub enum RecordError {
    /// A referenced informal id has no canonical mapping
    #[error("unresolved {kind} reference '{reference}'")]
    Unresolved { kind: IdKind, reference: String },

    /// The record's values were rejected
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Malformed statement or missing schema object
    #[error("schema error: {0}")]
    Schema(String),

    /// The session is unusable; escalates past the batch
    #[error("connection error: {0}")]
    Connection(rusqlite::Error),
}

impl RecordError {
    pub fn unresolved(kind: IdKind, reference: Option<&str>) -> Self {
        RecordError::Unresolved {
            kind,
            reference: reference.unwrap_or("<missing>").to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::Connection(_))
    }
}

impl From<rusqlite::Error> for RecordError {
    fn from(err: rusqlite::Error) -> Self {
        match classify(&err) {
            ErrorClass::Connection => RecordError::Connection(err),
            ErrorClass::Constraint => RecordError::InvalidValue(err.to_string()),
            ErrorClass::Schema => RecordError::Schema(err.to_string()),
        }
    }
}

/// Effect of a record that was written or already present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Inserted,
    /// The row already existed; not an error
    Skipped,
}

/// Classified result of one record
#[derive(Debug)]
pub enum RecordOutcome {
    Inserted,
    Skipped,
    Dropped(RecordError),
    Failed(RecordError),
}

impl From<Result<Written, RecordError>> for RecordOutcome {
    fn from(result: Result<Written, RecordError>) -> Self {
        match result {
            Ok(Written::Inserted) => RecordOutcome::Inserted,
            Ok(Written::Skipped) => RecordOutcome::Skipped,
            Err(e @ RecordError::Unresolved { .. }) => RecordOutcome::Dropped(e),
            Err(e) => RecordOutcome::Failed(e),
        }
    }
}

/// A dropped or failed record, kept for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub source_ref: String,
    pub reason: String,
}

/// Counts and issues for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub category: Category,
    pub inserted: usize,
    pub skipped: usize,
    pub dropped: Vec<RecordIssue>,
    pub failed: Vec<RecordIssue>,
    /// Set when the whole batch was rolled back
    pub aborted: Option<String>,
}

impl BatchReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            inserted: 0,
            skipped: 0,
            dropped: Vec::new(),
            failed: Vec::new(),
            aborted: None,
        }
    }

    /// Fold a record outcome into the report
    pub fn record(&mut self, source_ref: &str, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted => self.inserted += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Dropped(e) => self.dropped.push(RecordIssue {
                source_ref: source_ref.to_string(),
                reason: truncate_message(&e.to_string(), MAX_MESSAGE_LEN),
            }),
            RecordOutcome::Failed(e) => self.failed.push(RecordIssue {
                source_ref: source_ref.to_string(),
                reason: truncate_message(&e.to_string(), MAX_MESSAGE_LEN),
            }),
        }
    }

    /// Reset to a rolled-back batch
    pub fn abort(&mut self, reason: &str) {
        self.inserted = 0;
        self.skipped = 0;
        self.aborted = Some(truncate_message(reason, MAX_MESSAGE_LEN));
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn error_count(&self) -> usize {
        self.failed.len()
    }
}

/// Result of loading one scenario into the relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub scenario_id: String,
    pub batches: Vec<BatchReport>,
}

impl LoadReport {
    pub fn new(scenario_id: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            batches: Vec::new(),
        }
    }

    /// Rows inserted per category; zero for aborted categories
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        self.batches.iter().map(|b| (b.category, b.inserted)).collect()
    }

    /// Same as [`counts`](Self::counts), keyed by category name
    pub fn named_counts(&self) -> BTreeMap<String, usize> {
        self.batches
            .iter()
            .map(|b| (b.category.as_str().to_string(), b.inserted))
            .collect()
    }

    pub fn batch(&self, category: Category) -> Option<&BatchReport> {
        self.batches.iter().find(|b| b.category == category)
    }

    pub fn count(&self, category: Category) -> usize {
        self.batch(category).map(|b| b.inserted).unwrap_or(0)
    }

    pub fn total_inserted(&self) -> usize {
        self.batches.iter().map(|b| b.inserted).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.batches.iter().map(|b| b.skipped).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.batches.iter().map(|b| b.error_count()).sum()
    }

    /// Informal ids dropped in `category`
    pub fn dropped_refs(&self, category: Category) -> Vec<&str> {
        self.batch(category)
            .map(|b| b.dropped.iter().map(|d| d.source_ref.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn aborted(&self) -> Vec<Category> {
        self.batches
            .iter()
            .filter(|b| b.is_aborted())
            .map(|b| b.category)
            .collect()
    }
}
