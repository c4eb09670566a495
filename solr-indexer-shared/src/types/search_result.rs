//! Search result types.

use serde::{Deserialize, Serialize};

use crate::SolrDocument;

/// Response to a `FieldQuery`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    /// Total number of matching documents in the index.
    /// May be greater than `docs.len()` when rows are limited.
    pub num_found: u64,

    /// The returned documents.
    pub docs: Vec<SolrDocument>,
}

impl SearchResponse {
    /// Create an empty search response.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a new search response.
    pub fn new(num_found: u64, docs: Vec<SolrDocument>) -> Self {
        Self { num_found, docs }
    }

    /// Ids of the returned documents, skipping any without one.
    pub fn ids(&self) -> Vec<&str> {
        self.docs.iter().filter_map(SolrDocument::id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
