//! Solr implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! talking to a Solr core over its JSON HTTP API.

mod core_config;
mod provider;

pub use core_config::{BasicAuth, CoreConfig, RetryPolicy};
pub use provider::SolrProvider;
