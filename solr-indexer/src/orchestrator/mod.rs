//! Orchestrator module for the ingest pipeline.
//!
//! The [`RunCoordinator`] runs `workers × threads` units over one shared
//! [`RecordQueue`]. Each unit claims a record, builds its document and hands
//! it to its own [`BatchAccumulator`]. Outcomes are folded into one
//! [`RunSummary`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use solr_indexer_repository::{to_solr_id, ParentMarkOutcome, SearchIndexService};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::{interval_at, Duration, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::{FailureKind, IngestError};
use crate::loader::{BatchAccumulator, FlushReport, LoaderConfig};
use crate::processor::{BuildOutcome, DocumentBuilder};
use crate::source::{RecordQueue, RecordSource};
use crate::summary::{ExitPolicy, RecordOutcome, RunSummary};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers.
    pub workers: usize,
    /// Units per worker.
    pub threads: usize,
    pub batch_size: usize,
    /// Commit after every batch, and once more after parents are marked.
    pub always_commit: bool,
    /// Commit once after all units have drained. Ignored with `always_commit`.
    pub commit_at_end: bool,
    /// How often progress is logged.
    pub progress_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            threads: 1,
            batch_size: 2500,
            always_commit: false,
            commit_at_end: false,
            progress_interval: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    fn units(&self) -> usize {
        self.workers.max(1) * self.threads.max(1)
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    /// No more records will be claimed; in-flight records finish and partial
    /// batches are flushed.
    Draining,
    Completed,
    CompletedWithErrors,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed-with-errors",
        };
        f.write_str(name)
    }
}

/// Final report of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub summary: RunSummary,
    pub elapsed: Duration,
    /// The run was stopped before the source was exhausted.
    pub interrupted: bool,
    /// The final commit failed.
    pub commit_failed: bool,
}

impl RunReport {
    /// Whether the process should exit successfully. An interrupted run never
    /// is, since unclaimed records were left behind.
    pub fn is_success(&self, policy: &ExitPolicy) -> bool {
        !self.interrupted && !self.commit_failed && policy.is_success(&self.summary)
    }
}

/// State shared by the units of one run.
struct UnitContext {
    queue: RecordQueue,
    builder: Arc<DocumentBuilder>,
    index: Arc<SearchIndexService>,
    loader: LoaderConfig,
    summary: Mutex<RunSummary>,
    parents: Mutex<BTreeSet<String>>,
    /// Claimed records without an outcome yet, by label.
    outstanding: Mutex<HashMap<String, usize>>,
    exhausted: Notify,
    records_processed: AtomicU64,
    documents_indexed: AtomicU64,
}

impl UnitContext {
    async fn claimed(&self, record: &str) {
        *self
            .outstanding
            .lock()
            .await
            .entry(record.to_string())
            .or_default() += 1;
    }

    async fn resolved<'a>(&self, records: impl IntoIterator<Item = &'a str>) {
        let mut outstanding = self.outstanding.lock().await;
        for record in records {
            if let Some(count) = outstanding.get_mut(record) {
                *count -= 1;
                if *count == 0 {
                    outstanding.remove(record);
                }
            }
        }
    }

    async fn record(&self, record: &str, outcome: RecordOutcome) {
        self.resolved([record]).await;
        self.summary.lock().await.record(record, outcome);
    }

    async fn record_flush(&self, report: &FlushReport) {
        self.resolved(
            report
                .succeeded
                .iter()
                .chain(report.failed.iter().map(|(record, _)| record))
                .map(String::as_str),
        )
        .await;
        self.summary.lock().await.record_batch(report);
        self.documents_indexed
            .fetch_add(report.succeeded.len() as u64, Ordering::Relaxed);
    }
}

/// Coordinates one ingest run.
pub struct RunCoordinator {
    index: Arc<SearchIndexService>,
    builder: Arc<DocumentBuilder>,
    config: PoolConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl RunCoordinator {
    /// Create a new coordinator.
    ///
    /// # Arguments
    ///
    /// * `index` - Index client shared by all units
    /// * `builder` - Document builder shared by all units
    /// * `config` - Pool size, batching and commit settings
    pub fn new(
        index: Arc<SearchIndexService>,
        builder: Arc<DocumentBuilder>,
        config: PoolConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            index,
            builder,
            config,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<SearchIndexService> {
        &self.index
    }

    /// Ingest every record of `source`.
    ///
    /// Blocks until all records are processed or the run is interrupted by
    /// Ctrl-C or [`RunCoordinator::shutdown`]. An interrupted run still
    /// finishes in-flight records and flushes partial batches.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run completed, possibly with per-record failures
    /// * `Err(IngestError)` - The source is missing or empty
    #[instrument(skip(self, source), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, source: &RecordSource) -> Result<RunReport, IngestError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();
        let mut state = RunState::Starting;
        info!(
            state = %state,
            source = ?source.mode(),
            workers = self.config.workers,
            threads = self.config.threads,
            batch_size = self.config.batch_size,
            "Starting ingest run"
        );

        let stream = source.open()?;
        let ctx = Arc::new(UnitContext {
            queue: RecordQueue::new(stream),
            builder: Arc::clone(&self.builder),
            index: Arc::clone(&self.index),
            loader: LoaderConfig {
                batch_size: self.config.batch_size,
                always_commit: self.config.always_commit,
            },
            summary: Mutex::new(RunSummary::new()),
            parents: Mutex::new(BTreeSet::new()),
            outstanding: Mutex::new(HashMap::new()),
            exhausted: Notify::new(),
            records_processed: AtomicU64::new(0),
            documents_indexed: AtomicU64::new(0),
        });

        let mut handles = Vec::with_capacity(self.config.units());
        for worker in 0..self.config.workers.max(1) {
            for thread in 0..self.config.threads.max(1) {
                let ctx = Arc::clone(&ctx);
                handles.push(tokio::spawn(run_unit(ctx, worker, thread)));
            }
        }
        state = transition(state, RunState::Running);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.config.progress_interval;
        let mut progress_timer = interval_at(tokio::time::Instant::now() + period, period);
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut prev_records: u64 = 0;
        let mut prev_time = Instant::now();
        let mut interrupted = false;

        let units = join_all(handles);
        tokio::pin!(units);
        let results = loop {
            tokio::select! {
                results = &mut units => break results,
                _ = ctx.exhausted.notified(), if state == RunState::Running => {
                    state = transition(state, RunState::Draining);
                }
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    info!("Received shutdown signal");
                    interrupted = true;
                    ctx.queue.close().await;
                    state = transition(state, RunState::Draining);
                }
                _ = shutdown_rx.recv(), if !interrupted => {
                    info!("Shutdown requested");
                    interrupted = true;
                    ctx.queue.close().await;
                    state = transition(state, RunState::Draining);
                }
                _ = progress_timer.tick() => {
                    let records = ctx.records_processed.load(Ordering::Relaxed);
                    let docs = ctx.documents_indexed.load(Ordering::Relaxed);
                    let now = Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let records_per_sec = if elapsed_secs > 0.0 {
                        (records.saturating_sub(prev_records) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        records_processed = records,
                        documents_indexed = docs,
                        records_per_sec = format!("{:.2}", records_per_sec),
                        "Processing progress"
                    );
                    prev_records = records;
                    prev_time = now;
                }
            }
        };

        let mut aborted_units = 0;
        for result in results {
            if let Err(e) = result {
                error!(error = %e, "Worker unit terminated abnormally");
                aborted_units += 1;
            }
        }
        if aborted_units > 0 {
            record_lost(&ctx).await;
        }

        let marked = self.resolve_parents(&ctx).await;

        let final_commit = if self.config.always_commit {
            marked > 0
        } else {
            self.config.commit_at_end
        };
        let mut commit_failed = false;
        if final_commit {
            match self.index.commit().await {
                Ok(()) => info!("Committed index"),
                Err(e) => {
                    error!(error = %e, "Final commit failed");
                    commit_failed = true;
                }
            }
        }

        let claimed = ctx.queue.claimed().await;
        let summary = ctx.summary.lock().await.clone();
        if summary.seen != claimed {
            warn!(claimed, seen = summary.seen, "Claimed records missing from summary");
        }
        let final_state = if summary.has_failures() || commit_failed || interrupted {
            RunState::CompletedWithErrors
        } else {
            RunState::Completed
        };
        transition(state, final_state);

        let elapsed = started.elapsed();
        info!(
            claimed,
            seen = summary.seen,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            parents_marked = summary.parents_marked.len(),
            missing_parents = summary.missing_parents.len(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Ingest run finished"
        );
        for failure in &summary.failures {
            warn!(record = %failure.record, kind = %failure.kind, error = %failure.message, "Record failed");
        }

        Ok(RunReport {
            run_id,
            state: final_state,
            summary,
            elapsed,
            interrupted,
            commit_failed,
        })
    }

    /// Flag every parent referenced by a child of this run. Returns the
    /// number of documents updated.
    async fn resolve_parents(&self, ctx: &UnitContext) -> usize {
        let parents = std::mem::take(&mut *ctx.parents.lock().await);
        if parents.is_empty() {
            return 0;
        }
        info!(count = parents.len(), "Marking parent datasets");
        let mut marked = 0;

        for parent in parents {
            match self.index.mark_parent(&parent).await {
                Ok(ParentMarkOutcome::Marked) => {
                    marked += 1;
                    ctx.summary.lock().await.parents_marked.push(parent);
                }
                Ok(ParentMarkOutcome::AlreadyParent) => {
                    debug!(parent_id = %parent, "Already marked as parent");
                }
                Ok(ParentMarkOutcome::NotFound) => {
                    warn!(parent_id = %parent, "Parent dataset not in index");
                    ctx.summary.lock().await.missing_parents.push(parent);
                }
                Err(e) => {
                    warn!(parent_id = %parent, error = %e, "Could not mark parent dataset");
                }
            }
        }
        marked
    }

    /// Flag one dataset as a parent, outside the worker pool.
    ///
    /// # Arguments
    ///
    /// * `metadata_identifier` - Identifier of the dataset as written in its record
    #[instrument(skip(self))]
    pub async fn mark_parent(
        &self,
        metadata_identifier: &str,
    ) -> Result<ParentMarkOutcome, IngestError> {
        let id = to_solr_id(metadata_identifier.trim());
        let outcome = self.index.mark_parent(&id).await?;
        if outcome == ParentMarkOutcome::Marked
            && (self.config.always_commit || self.config.commit_at_end)
        {
            self.index.commit().await?;
        }
        info!(parent_id = %id, outcome = ?outcome, "Parent mark finished");
        Ok(outcome)
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn transition(from: RunState, to: RunState) -> RunState {
    if from != to {
        info!(from = %from, to = %to, "Run state changed");
    }
    to
}

/// Fail every claimed record left without an outcome by a unit that stopped
/// abnormally.
async fn record_lost(ctx: &UnitContext) {
    let lost = std::mem::take(&mut *ctx.outstanding.lock().await);
    let mut summary = ctx.summary.lock().await;
    for (record, count) in lost {
        for _ in 0..count {
            summary.record(
                &record,
                RecordOutcome::Failed {
                    kind: FailureKind::Aborted,
                    message: "worker unit terminated before the record was indexed".to_string(),
                },
            );
        }
    }
}

/// One unit of the pool: claim, build, accumulate until the queue is empty.
async fn run_unit(ctx: Arc<UnitContext>, worker: usize, thread: usize) {
    let mut accumulator = BatchAccumulator::new(Arc::clone(&ctx.index), ctx.loader.clone());
    debug!(worker, thread, "Unit started");

    while let Some(record) = ctx.queue.claim().await {
        let label = record.label();
        ctx.claimed(&label).await;
        match ctx.builder.build(&record).await {
            Ok(BuildOutcome::Document(built)) => {
                if let Some(parent) = built.parent_id {
                    ctx.parents.lock().await.insert(parent);
                }
                if let Some(report) = accumulator.add(label, built.document).await {
                    ctx.record_flush(&report).await;
                }
            }
            Ok(BuildOutcome::Skipped { reason }) => {
                info!(record = %label, reason = %reason, "Record skipped");
                ctx.record(&label, RecordOutcome::skipped(reason)).await;
            }
            Err(e) => {
                warn!(record = %label, error = %e, "Record failed");
                ctx.record(&label, RecordOutcome::failed(&e)).await;
            }
        }
        ctx.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    ctx.exhausted.notify_one();
    if let Some(report) = accumulator.finish().await {
        ctx.record_flush(&report).await;
    }
    debug!(worker, thread, "Unit finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_units() {
        let config = PoolConfig {
            workers: 3,
            threads: 4,
            ..PoolConfig::default()
        };
        assert_eq!(config.units(), 12);
        let config = PoolConfig {
            workers: 0,
            threads: 0,
            ..PoolConfig::default()
        };
        assert_eq!(config.units(), 1);
    }

    #[test]
    fn test_report_success() {
        let mut summary = RunSummary::new();
        summary.record("a", RecordOutcome::Succeeded);
        summary.record("b", RecordOutcome::failed(&IngestError::build("x")));
        let report = RunReport {
            run_id: Uuid::new_v4(),
            state: RunState::CompletedWithErrors,
            summary,
            elapsed: Duration::from_secs(1),
            interrupted: false,
            commit_failed: false,
        };

        assert!(report.is_success(&ExitPolicy::default()));
        assert!(!report.is_success(&ExitPolicy::new(Some(10.0))));
        assert!(report.is_success(&ExitPolicy::new(Some(50.0))));

        let failed_commit = RunReport {
            commit_failed: true,
            ..report.clone()
        };
        assert!(!failed_commit.is_success(&ExitPolicy::default()));

        let interrupted = RunReport {
            interrupted: true,
            ..report
        };
        assert!(!interrupted.is_success(&ExitPolicy::default()));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::CompletedWithErrors.to_string(), "completed-with-errors");
    }
}
