//! # Solr Indexer Shared
//!
//! This crate defines the data structures shared across the Solr indexer crates.
//! It includes the index document representation and the query/response types
//! used when reading back from the index.

pub mod types;

pub use types::search_query::{FieldQuery, QueryParseError};
pub use types::search_result::SearchResponse;
pub use types::solr_document::SolrDocument;
