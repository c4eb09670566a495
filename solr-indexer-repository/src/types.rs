//! Request and response types for search index operations.

use crate::errors::SearchIndexError;

/// Result of a batch operation for a single document.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document id.
    pub id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This allows callers to handle partial failures without discarding the whole batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// A summary in which every id succeeded.
    pub fn all_succeeded<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let results: Vec<BatchOperationResult> = ids
            .into_iter()
            .map(|id| BatchOperationResult {
                id: id.to_string(),
                success: true,
                error: None,
            })
            .collect();
        Self {
            total: results.len(),
            succeeded: results.len(),
            failed: 0,
            results,
        }
    }

    /// Results of the documents that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Outcome of marking a dataset as a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentMarkOutcome {
    /// The document was updated with `isParent = true`.
    Marked,
    /// The document was already flagged; nothing was sent.
    AlreadyParent,
    /// No document with that id exists in the index.
    NotFound,
}
