//! # Solr Indexer Repository
//!
//! This crate provides traits and implementations for interacting with the
//! search index. It includes definitions for errors, interfaces, and a
//! concrete implementation for Apache Solr.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod service;
pub mod solr;
pub mod types;
pub mod utils;

pub use config::SearchIndexServiceConfig;
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use service::SearchIndexService;
pub use solr::{BasicAuth, CoreConfig, RetryPolicy, SolrProvider};
pub use types::{BatchOperationResult, BatchOperationSummary, ParentMarkOutcome};
pub use utils::to_solr_id;
