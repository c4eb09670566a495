//! This module defines the core data structures and types used across the indexer.
//! It re-exports specific types like `SolrDocument`.

pub mod search_query;
pub mod search_result;
pub mod solr_document;

pub use solr_document::SolrDocument;
