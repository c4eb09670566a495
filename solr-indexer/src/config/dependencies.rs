//! Dependency initialization and wiring for the indexer.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use solr_indexer_repository::{SearchIndexService, SearchIndexServiceConfig, SolrProvider};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::IndexerConfig;
use crate::orchestrator::{PoolConfig, RunCoordinator};
use crate::processor::{
    BuildOptions, DasFeatureTypeDetector, DocumentBuilder, FeatureTypeDetector, FeatureTypePolicy,
};
use crate::thumbnail::{self, ThumbnailProvider};
use crate::IndexingError;

/// Progress log period of a run.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// What to do when the index is unreachable at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Fail immediately if the connection fails.
    #[default]
    FailFast,
    /// Retry every `connection-retry-secs` until the index answers.
    Retry,
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(Self::FailFast),
            "retry" => Ok(Self::Retry),
            other => Err(format!(
                "connection-mode must be 'fail-fast' or 'retry', got '{}'",
                other
            )),
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured coordinator ready to run.
    pub coordinator: RunCoordinator,
}

impl Dependencies {
    /// Initialize everything a run needs.
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration
    /// * `options` - Build settings, including command line thumbnail flags
    /// * `thumbnails` - Whether a thumbnail provider is created at all (`-n` disables it)
    /// * `pool` - Worker pool settings
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the index is unreachable (fail-fast mode) or
    ///   a client cannot be created
    pub async fn new(
        config: &IndexerConfig,
        options: BuildOptions,
        thumbnails: bool,
        pool: PoolConfig,
    ) -> Result<Self, IndexingError> {
        info!(
            solr_server = %config.solr_server,
            solr_core = %config.solr_core,
            connection_mode = ?config.connection_mode,
            thumbnail_impl = ?config.thumbnail_impl,
            thumbnails = thumbnails,
            "Initializing dependencies"
        );

        let index = connect_index(config).await?;
        info!("Solr connection established");

        let thumbnail_provider: Option<Arc<dyn ThumbnailProvider>> = if thumbnails {
            Some(thumbnail::from_config(&config.thumbnail_impl, config.wms_timeout)?)
        } else {
            None
        };

        let feature_types: Option<Arc<dyn FeatureTypeDetector>> =
            if options.feature_type == FeatureTypePolicy::Detect {
                Some(Arc::new(DasFeatureTypeDetector::new(config.wms_timeout)?))
            } else {
                None
            };

        let builder = DocumentBuilder::new(options, thumbnail_provider, feature_types);
        let coordinator = RunCoordinator::new(index, Arc::new(builder), pool);

        Ok(Self { coordinator })
    }

    /// Pool settings from the configuration file.
    pub fn pool_config(config: &IndexerConfig) -> PoolConfig {
        PoolConfig {
            workers: config.workers,
            threads: config.threads,
            batch_size: config.batch_size,
            always_commit: config.always_commit,
            commit_at_end: config.commit_at_end(),
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

/// Create the index client and wait for the index according to the
/// configured connection mode.
pub async fn connect_index(config: &IndexerConfig) -> Result<Arc<SearchIndexService>, IndexingError> {
    let provider = SolrProvider::new(config.core_config())
        .map_err(|e| IndexingError::config(format!("Failed to create Solr client: {}", e)))?;
    let service = Arc::new(SearchIndexService::with_config(
        Arc::new(provider),
        SearchIndexServiceConfig::with_max_batch_size(config.batch_size),
    ));

    loop {
        match service.ping().await {
            Ok(()) => return Ok(service),
            Err(e) => match config.connection_mode {
                ConnectionMode::FailFast => {
                    return Err(IndexingError::config(format!(
                        "Failed to connect to Solr: {}",
                        e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        solr_server = %config.solr_server,
                        error = %e,
                        retry_interval_secs = config.connection_retry.as_secs(),
                        "Failed to connect to Solr, retrying..."
                    );
                    sleep(config.connection_retry).await;
                }
            },
        }
    }
}
