//! Loader module for the ingest pipeline.
//!
//! Each unit of the worker pool owns one [`BatchAccumulator`]. Documents are
//! buffered until the batch is full and then submitted in one request.

use std::collections::HashMap;
use std::sync::Arc;

use solr_indexer_repository::SearchIndexService;
use solr_indexer_shared::SolrDocument;
use tracing::{debug, error, instrument, warn};

/// Configuration for a batch accumulator.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of documents to batch before flushing.
    pub batch_size: usize,
    /// Commit after every successful flush.
    pub always_commit: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 2500,
            always_commit: false,
        }
    }
}

/// A built document waiting for its batch to be flushed.
#[derive(Debug, Clone)]
pub struct PendingDocument {
    /// Label of the record the document was built from.
    pub record: String,
    pub document: SolrDocument,
}

/// Outcome of one flush, per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Number of documents sent in the request.
    pub submitted: usize,
    /// Records whose documents reached the index.
    pub succeeded: Vec<String>,
    /// Records whose documents were rejected, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Collects documents into bounded batches and submits them.
///
/// A batch never holds two documents with the same id: adding a document
/// whose id is already pending flushes the current batch first.
pub struct BatchAccumulator {
    index: Arc<SearchIndexService>,
    config: LoaderConfig,
    pending: Vec<PendingDocument>,
}

impl BatchAccumulator {
    /// Create a new accumulator submitting through the given service.
    pub fn new(index: Arc<SearchIndexService>, config: LoaderConfig) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            index,
            config: LoaderConfig {
                batch_size,
                ..config
            },
            pending: Vec::with_capacity(batch_size),
        }
    }

    /// Number of documents waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Add a document, flushing when the batch is full.
    ///
    /// # Arguments
    ///
    /// * `record` - Label of the source record, used in the flush report
    /// * `document` - The document to submit
    ///
    /// # Returns
    ///
    /// The report of the flush this call triggered, if any.
    pub async fn add(&mut self, record: String, document: SolrDocument) -> Option<FlushReport> {
        let duplicate = document
            .id()
            .is_some_and(|id| self.pending.iter().any(|p| p.document.id() == Some(id)));
        let early = if duplicate {
            debug!(id = ?document.id(), "Id already pending, flushing batch early");
            Some(self.flush().await)
        } else {
            None
        };

        self.pending.push(PendingDocument { record, document });
        if self.pending.len() >= self.config.batch_size {
            let report = self.flush().await;
            return Some(merge(early, report));
        }
        early
    }

    /// Flush whatever is left. Consumes the accumulator, so the final partial
    /// batch can only be flushed once.
    pub async fn finish(mut self) -> Option<FlushReport> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.flush().await)
    }

    #[instrument(skip(self), fields(count = self.pending.len()))]
    async fn flush(&mut self) -> FlushReport {
        let batch: Vec<PendingDocument> = self.pending.drain(..).collect();
        let documents: Vec<SolrDocument> = batch.iter().map(|p| p.document.clone()).collect();
        let mut report = FlushReport {
            submitted: batch.len(),
            ..FlushReport::default()
        };

        match self.index.submit(&documents).await {
            Ok(summary) => {
                let failures: HashMap<&str, String> = summary
                    .failures()
                    .map(|r| {
                        let reason = r
                            .error
                            .as_ref()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "rejected by index".to_string());
                        (r.id.as_str(), reason)
                    })
                    .collect();
                for pending in batch {
                    match pending.document.id().and_then(|id| failures.get(id)) {
                        Some(reason) => {
                            error!(record = %pending.record, error = %reason, "Document rejected");
                            report.failed.push((pending.record, reason.clone()));
                        }
                        None => report.succeeded.push(pending.record),
                    }
                }
                debug!(
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    "Batch submitted"
                );
            }
            Err(e) => {
                error!(error = %e, count = report.submitted, "Batch submission failed");
                let reason = e.to_string();
                report.failed = batch
                    .into_iter()
                    .map(|p| (p.record, reason.clone()))
                    .collect();
            }
        }

        if self.config.always_commit && !report.succeeded.is_empty() {
            if let Err(e) = self.index.commit().await {
                warn!(error = %e, "Commit after batch failed");
            }
        }
        report
    }
}

fn merge(first: Option<FlushReport>, mut second: FlushReport) -> FlushReport {
    if let Some(mut first) = first {
        first.submitted += second.submitted;
        first.succeeded.append(&mut second.succeeded);
        first.failed.append(&mut second.failed);
        return first;
    }
    second
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solr_indexer_repository::{
        BatchOperationResult, BatchOperationSummary, SearchIndexError, SearchIndexProvider,
    };
    use solr_indexer_shared::{FieldQuery, SearchResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Mock search provider for testing.
    #[derive(Default)]
    struct MockSearchProvider {
        batches: Mutex<Vec<Vec<String>>>,
        commits: AtomicUsize,
        reject_id: Option<String>,
        unavailable: bool,
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchProvider {
        async fn ping(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn add_documents(
            &self,
            documents: &[SolrDocument],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            if self.unavailable {
                return Err(SearchIndexError::connection("connection refused"));
            }
            let ids: Vec<String> = documents
                .iter()
                .map(|d| d.id().unwrap_or_default().to_string())
                .collect();
            self.batches.lock().await.push(ids.clone());

            let results: Vec<BatchOperationResult> = ids
                .into_iter()
                .map(|id| {
                    let rejected = self.reject_id.as_deref() == Some(id.as_str());
                    BatchOperationResult {
                        error: rejected.then(|| SearchIndexError::submit("bad field")),
                        success: !rejected,
                        id,
                    }
                })
                .collect();
            let failed = results.iter().filter(|r| !r.success).count();
            Ok(BatchOperationSummary {
                total: results.len(),
                succeeded: results.len() - failed,
                failed,
                results,
            })
        }

        async fn commit(&self) -> Result<(), SearchIndexError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get_document(&self, _id: &str) -> Result<Option<SolrDocument>, SearchIndexError> {
            Ok(None)
        }

        async fn update_document(&self, _document: &SolrDocument) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn delete_document(&self, _id: &str) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn search(&self, _query: &FieldQuery) -> Result<SearchResponse, SearchIndexError> {
            Ok(SearchResponse::empty())
        }
    }

    fn doc(id: &str) -> SolrDocument {
        SolrDocument::new(id, id)
    }

    fn accumulator(
        provider: Arc<MockSearchProvider>,
        batch_size: usize,
        always_commit: bool,
    ) -> BatchAccumulator {
        BatchAccumulator::new(
            Arc::new(SearchIndexService::new(provider)),
            LoaderConfig {
                batch_size,
                always_commit,
            },
        )
    }

    #[tokio::test]
    async fn test_flushes_full_batches_and_remainder() {
        let provider = Arc::new(MockSearchProvider::default());
        let mut acc = accumulator(provider.clone(), 2, false);

        let mut reports = Vec::new();
        for i in 0..5 {
            let id = format!("d{}", i);
            if let Some(report) = acc.add(format!("r{}", i), doc(&id)).await {
                reports.push(report);
            }
        }
        assert_eq!(acc.pending(), 1);
        reports.extend(acc.finish().await);

        let sizes: Vec<usize> = reports.iter().map(|r| r.submitted).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(provider.batches.lock().await.len(), 3);
        assert_eq!(provider.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finish_without_pending_does_not_submit() {
        let provider = Arc::new(MockSearchProvider::default());
        let acc = accumulator(provider.clone(), 2, false);
        assert!(acc.finish().await.is_none());
        assert!(provider.batches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_index_fails_whole_batch() {
        let provider = Arc::new(MockSearchProvider {
            unavailable: true,
            ..Default::default()
        });
        let mut acc = accumulator(provider, 2, false);
        assert!(acc.add("r0".into(), doc("a")).await.is_none());
        let report = acc.add("r1".into(), doc("b")).await.unwrap();

        assert!(report.succeeded.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].1.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_rejected_document_is_reported() {
        let provider = Arc::new(MockSearchProvider {
            reject_id: Some("b".to_string()),
            ..Default::default()
        });
        let mut acc = accumulator(provider, 3, false);
        acc.add("ra".into(), doc("a")).await;
        acc.add("rb".into(), doc("b")).await;
        let report = acc.finish().await.unwrap();

        assert_eq!(report.succeeded, vec!["ra".to_string()]);
        assert_eq!(report.failed[0].0, "rb");
    }

    #[tokio::test]
    async fn test_duplicate_id_flushes_early() {
        let provider = Arc::new(MockSearchProvider::default());
        let mut acc = accumulator(provider.clone(), 10, false);
        assert!(acc.add("r0".into(), doc("a")).await.is_none());
        let report = acc.add("r1".into(), doc("a")).await.unwrap();

        assert_eq!(report.submitted, 1);
        assert_eq!(acc.pending(), 1);
        acc.finish().await;
        assert_eq!(
            *provider.batches.lock().await,
            vec![vec!["a".to_string()], vec!["a".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_always_commit_commits_each_batch() {
        let provider = Arc::new(MockSearchProvider::default());
        let mut acc = accumulator(provider.clone(), 1, true);
        acc.add("r0".into(), doc("a")).await;
        acc.add("r1".into(), doc("b")).await;
        assert!(acc.finish().await.is_none());
        assert_eq!(provider.commits.load(Ordering::SeqCst), 2);
    }
}
