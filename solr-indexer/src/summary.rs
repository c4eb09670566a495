//! Run summary and exit policy.
//!
//! Every claimed record ends up in exactly one of the `succeeded`, `failed`
//! or `skipped` buckets, so `succeeded + failed + skipped == seen` holds after
//! every update. Built documents are only counted once their batch has been
//! submitted.

use std::fmt;

use serde::Serialize;

use crate::errors::{FailureKind, IngestError};
use crate::loader::FlushReport;

/// Final classification of one record.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// The record's document reached the index.
    Succeeded,
    /// The record was intentionally not indexed.
    Skipped { reason: String },
    /// The record failed.
    Failed { kind: FailureKind, message: String },
}

impl RecordOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(error: &IngestError) -> Self {
        Self::Failed {
            kind: error.failure_kind(),
            message: error.to_string(),
        }
    }
}

/// A failed record and why.
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub record: String,
    pub kind: String,
    pub message: String,
}

/// Aggregated per-record outcomes of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub seen: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub failures: Vec<RecordFailure>,
    /// Parent ids flagged with `isParent` during this run.
    pub parents_marked: Vec<String>,
    /// Parent ids referenced by children but absent from the index.
    pub missing_parents: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record outcome into the summary.
    pub fn record(&mut self, record: &str, outcome: RecordOutcome) {
        self.seen += 1;
        match outcome {
            RecordOutcome::Succeeded => self.succeeded += 1,
            RecordOutcome::Skipped { .. } => self.skipped += 1,
            RecordOutcome::Failed { kind, message } => {
                self.failed += 1;
                self.failures.push(RecordFailure {
                    record: record.to_string(),
                    kind: kind.to_string(),
                    message,
                });
            }
        }
    }

    /// Fold the outcome of one batch flush into the summary.
    pub fn record_batch(&mut self, report: &FlushReport) {
        let succeeded = report.succeeded.len() as u64;
        let failed = report.failed.len() as u64;
        self.seen += succeeded + failed;
        self.succeeded += succeeded;
        self.failed += failed;
        for (record, message) in &report.failed {
            self.failures.push(RecordFailure {
                record: record.clone(),
                kind: FailureKind::Submit.to_string(),
                message: message.clone(),
            });
        }
    }

    /// Failed records as a percentage of seen records.
    pub fn failure_percent(&self) -> f64 {
        if self.seen == 0 {
            return 0.0;
        }
        (self.failed as f64 / self.seen as f64) * 100.0
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed + self.skipped == self.seen
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} succeeded={} failed={} skipped={}",
            self.seen, self.succeeded, self.failed, self.skipped
        )
    }
}

/// Decides the process exit status of a completed run.
///
/// Per-record failures never fail the run unless a threshold is configured;
/// with `max_failure_percent = Some(p)`, a failure rate above `p` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitPolicy {
    pub max_failure_percent: Option<f64>,
}

impl ExitPolicy {
    pub fn new(max_failure_percent: Option<f64>) -> Self {
        Self {
            max_failure_percent,
        }
    }

    /// Whether the run should be reported as successful.
    pub fn is_success(&self, summary: &RunSummary) -> bool {
        match self.max_failure_percent {
            Some(max) => summary.failure_percent() <= max,
            None => true,
        }
    }
}
