//! Search index service implementation.
//!
//! This module provides the main service for interacting with the search index.
//! The ingest pipeline uses it to submit batches, commit and mark parent
//! datasets; the search CLI uses it for lookups and deletes.
//!
//! # Note on Document Creation
//!
//! There is no separate `create` function. Solr `add` is an upsert keyed by
//! `id`: it creates the document if it doesn't exist and replaces it if it does.

use std::collections::HashSet;
use std::sync::Arc;

use solr_indexer_shared::types::solr_document::IS_PARENT_FIELD;
use solr_indexer_shared::{FieldQuery, SearchResponse, SolrDocument};
use tracing::{debug, info, instrument};

use crate::config::SearchIndexServiceConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BatchOperationSummary, ParentMarkOutcome};

/// Index-derived fields dropped before a stored document is re-submitted.
///
/// These are either computed by the index from other fields or refused on
/// input, so a document read back with them cannot be added unchanged.
pub const PARENT_STRIPPED_FIELDS: [&str; 8] = [
    "full_text",
    "bbox__maxX",
    "bbox__maxY",
    "bbox__minX",
    "bbox__minY",
    "bbox_rpt",
    "ss_access",
    "_version_",
];

/// The main service for interacting with the search index.
///
/// This is the high-level API that application code should use. It validates
/// input and delegates to a `SearchIndexProvider` for the backend operations.
/// All operations return `SearchIndexError` for consistent error handling.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use solr_indexer_repository::{CoreConfig, SearchIndexService, SolrProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = SolrProvider::new(CoreConfig::new("http://localhost:8983/solr", "mmd"))?;
/// let service = SearchIndexService::new(Arc::new(provider));
///
/// service.ping().await?;
/// let outcome = service.mark_parent("no-met-dataset-1").await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchIndexService {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchIndexServiceConfig,
}

impl SearchIndexService {
    /// Create a new SearchIndexService with default configuration.
    ///
    /// # Arguments
    ///
    /// * `provider` - A shared implementation of `SearchIndexProvider` (e.g., `SolrProvider`)
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexServiceConfig::default(),
        }
    }

    /// Create a new SearchIndexService with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `provider` - A shared implementation of `SearchIndexProvider`
    /// * `config` - Configuration for the service
    pub fn with_config(
        provider: Arc<dyn SearchIndexProvider>,
        config: SearchIndexServiceConfig,
    ) -> Self {
        Self { provider, config }
    }

    /// Validate that batch size does not exceed configured maximum.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Every document must carry a non-empty id, and ids must be unique
    /// within one submission.
    fn validate_batch_ids(documents: &[SolrDocument]) -> Result<(), SearchIndexError> {
        let mut seen = HashSet::with_capacity(documents.len());
        for (position, document) in documents.iter().enumerate() {
            let id = match document.id() {
                Some(id) if !id.trim().is_empty() => id,
                _ => {
                    return Err(SearchIndexError::validation(format!(
                        "Document at position {} has no id",
                        position
                    )))
                }
            };
            if !seen.insert(id) {
                return Err(SearchIndexError::validation(format!(
                    "Duplicate id '{}' in batch",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Check that the index is reachable.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        self.provider.ping().await
    }

    /// Submit one batch of documents.
    ///
    /// # Arguments
    ///
    /// * `documents` - The batch, in submission order
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcome
    /// * `Err(SearchIndexError)` - If validation fails or the batch failed as a whole
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn submit(
        &self,
        documents: &[SolrDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }
        self.validate_batch_size(documents.len())?;
        Self::validate_batch_ids(documents)?;

        self.provider.add_documents(documents).await
    }

    /// Make everything submitted so far visible.
    pub async fn commit(&self) -> Result<(), SearchIndexError> {
        self.provider.commit().await
    }

    /// Real-time lookup of a document by id.
    pub async fn get(&self, id: &str) -> Result<Option<SolrDocument>, SearchIndexError> {
        if id.trim().is_empty() {
            return Err(SearchIndexError::validation("id cannot be empty"));
        }
        self.provider.get_document(id).await
    }

    /// Run a single-field query.
    pub async fn search(&self, query: &FieldQuery) -> Result<SearchResponse, SearchIndexError> {
        if query.field.is_empty() {
            return Err(SearchIndexError::validation("query field cannot be empty"));
        }
        self.provider.search(query).await
    }

    /// Delete a document by id.
    pub async fn delete(&self, id: &str) -> Result<(), SearchIndexError> {
        if id.trim().is_empty() {
            return Err(SearchIndexError::validation("id cannot be empty"));
        }
        self.provider.delete_document(id).await
    }

    /// Flag a stored dataset as a parent.
    ///
    /// Reads the stored document, strips the index-derived fields, sets
    /// `isParent = true` and re-submits it as a single-document update.
    /// Idempotent: a document that is already a parent is left alone.
    ///
    /// # Arguments
    ///
    /// * `id` - Index id of the parent dataset
    ///
    /// # Returns
    ///
    /// * `Ok(ParentMarkOutcome)` - What happened to the document
    /// * `Err(SearchIndexError)` - If the lookup or update failed
    #[instrument(skip(self))]
    pub async fn mark_parent(&self, id: &str) -> Result<ParentMarkOutcome, SearchIndexError> {
        let Some(mut document) = self.get(id).await? else {
            debug!("Parent not found in index");
            return Ok(ParentMarkOutcome::NotFound);
        };

        if document.is_parent() {
            debug!("Already updated");
            return Ok(ParentMarkOutcome::AlreadyParent);
        }

        for field in PARENT_STRIPPED_FIELDS {
            document.remove(field);
        }
        document.set(IS_PARENT_FIELD, true);

        self.provider.update_document(&document).await?;
        info!(parent_id = %id, "Marked dataset as parent");
        Ok(ParentMarkOutcome::Marked)
    }
}
