//! Search index provider trait definition.
//!
//! This module defines the abstract interface for index operations so that the
//! ingest pipeline can run against Solr in production and an in-memory mock in
//! tests.

use async_trait::async_trait;
use solr_indexer_shared::{FieldQuery, SearchResponse, SolrDocument};

use crate::errors::SearchIndexError;
use crate::types::BatchOperationSummary;

/// Abstracts the underlying search index implementation.
///
/// # Upsert contract
///
/// `add_documents` and `update_document` are idempotent upserts keyed by the
/// document `id`: submitting the same id twice overwrites, it never duplicates.
/// The ingest pipeline relies on this for at-least-once delivery.
///
/// # Visibility
///
/// Submitted documents are not guaranteed to be visible to searches until
/// `commit` is called. `get_document` is a real-time lookup and sees
/// uncommitted documents.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check that the index is reachable and the core is loaded.
    async fn ping(&self) -> Result<(), SearchIndexError>;

    /// Submit a batch of documents.
    ///
    /// Implementations apply their own retry policy before giving up.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcome of the submission
    /// * `Err(SearchIndexError)` - If the batch failed as a whole after retries
    async fn add_documents(
        &self,
        documents: &[SolrDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Make submitted documents visible and durable.
    async fn commit(&self) -> Result<(), SearchIndexError>;

    /// Real-time lookup of a single document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(doc))` - If the document exists
    /// * `Ok(None)` - If it does not
    async fn get_document(&self, id: &str) -> Result<Option<SolrDocument>, SearchIndexError>;

    /// Replace a single document immediately, outside of any batch.
    async fn update_document(&self, document: &SolrDocument) -> Result<(), SearchIndexError>;

    /// Delete a document by id. Deleting a missing id is not an error.
    async fn delete_document(&self, id: &str) -> Result<(), SearchIndexError>;

    /// Run a single-field query.
    async fn search(&self, query: &FieldQuery) -> Result<SearchResponse, SearchIndexError>;
}
