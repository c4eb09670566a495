//! # Solr Indexer
//!
//! Concurrent bulk indexer for MMD dataset metadata into Solr.
//!
//! ## Architecture
//!
//! The indexer follows the Source-Processor-Loader pattern:
//!
//! 1. **Source**: Enumerates MMD records and hands them out one at a time
//! 2. **Processor**: Builds an index document per record, with feature type and thumbnail
//! 3. **Loader**: Batches documents and submits them to Solr
//! 4. **Orchestrator**: Runs the worker pool and aggregates the run summary
//!
//! ## Modules
//!
//! - [`config`]: Configuration file and dependency initialization
//! - [`source`]: Record enumeration and exclusive claiming
//! - [`processor`]: MMD parsing and document building
//! - [`thumbnail`]: Embedded and service-backed thumbnail providers
//! - [`loader`]: Batch accumulation and submission
//! - [`orchestrator`]: Worker pool and run coordination
//! - [`summary`]: Per-record outcomes and exit policy
//! - [`errors`]: Error types for the indexer

pub mod cli;
pub mod config;
pub mod errors;
pub mod loader;
pub mod logging;
pub mod orchestrator;
pub mod processor;
pub mod source;
pub mod summary;
pub mod thumbnail;
pub mod xml;

pub use config::{Dependencies, IndexerConfig};
pub use errors::IngestError;
pub use orchestrator::{RunCoordinator, RunReport};
pub use source::RecordSource;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
