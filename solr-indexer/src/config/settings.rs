//! Indexer configuration file.
//!
//! The configuration is read once from the file given with `-c` and passed by
//! value down the pipeline. Keys keep the names used by existing deployments
//! (`solrserver`, `batch-size`, `thumbnail_impl`, ...).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use solr_indexer_repository::{BasicAuth, CoreConfig, RetryPolicy};
use tracing::debug;

use crate::config::dependencies::ConnectionMode;
use crate::processor::{FeatureTypePolicy, ThumbnailFailurePolicy};
use crate::thumbnail::{Projection, ThumbnailImpl};
use crate::IndexingError;

const DEFAULT_WMS_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BATCH_SIZE: usize = 2500;
const DEFAULT_WORKERS: usize = 10;
const DEFAULT_THREADS: usize = 20;
const DEFAULT_SUBMIT_RETRIES: u32 = 3;
const DEFAULT_SUBMIT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_SOLR_TIMEOUT_SECS: u64 = 1020;
const DEFAULT_CONNECTION_RETRY_SECS: u64 = 15;

/// Environment keys read from the file named by `dotenv_path`.
const ENV_SOLR_USERNAME: &str = "SOLR_USERNAME";
const ENV_SOLR_PASSWORD: &str = "SOLR_PASSWORD";

/// The configuration file as written on disk. Every key is optional here;
/// required keys and value ranges are checked by [`IndexerConfig::from_file`].
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    solrserver: Option<String>,
    solrcore: Option<String>,
    #[serde(rename = "auth-basic-username")]
    auth_basic_username: Option<String>,
    #[serde(rename = "auth-basic-password")]
    auth_basic_password: Option<String>,
    dotenv_path: Option<PathBuf>,
    #[serde(rename = "wms-thumbnail-projection")]
    wms_thumbnail_projection: Option<String>,
    #[serde(rename = "wms-timeout")]
    wms_timeout: Option<u64>,
    #[serde(rename = "wms-coastline-layer")]
    wms_coastline_layer: Option<String>,
    #[serde(rename = "batch-size")]
    batch_size: Option<usize>,
    workers: Option<usize>,
    threads: Option<usize>,
    thumbnail_impl: Option<String>,
    thumbnail_api_host: Option<String>,
    thumbnail_api_endpoint: Option<String>,
    #[serde(rename = "skip-feature-type")]
    skip_feature_type: Option<bool>,
    #[serde(rename = "override-feature-type")]
    override_feature_type: Option<String>,
    #[serde(rename = "end-solr-commit")]
    end_solr_commit: Option<bool>,
    #[serde(rename = "thumbnail-failure")]
    thumbnail_failure: Option<String>,
    #[serde(rename = "max-failure-percent")]
    max_failure_percent: Option<f64>,
    #[serde(rename = "submit-retries")]
    submit_retries: Option<u32>,
    #[serde(rename = "submit-retry-backoff-ms")]
    submit_retry_backoff_ms: Option<u64>,
    #[serde(rename = "solr-timeout")]
    solr_timeout: Option<u64>,
    #[serde(rename = "connection-mode")]
    connection_mode: Option<String>,
    #[serde(rename = "connection-retry-secs")]
    connection_retry_secs: Option<u64>,
}

/// Validated indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub solr_server: String,
    pub solr_core: String,
    pub auth: Option<BasicAuth>,
    pub projection: Projection,
    pub wms_timeout: Duration,
    pub wms_coastline_layer: Option<String>,
    pub batch_size: usize,
    pub workers: usize,
    pub threads: usize,
    pub thumbnail_impl: ThumbnailImpl,
    pub feature_type: FeatureTypePolicy,
    pub end_solr_commit: bool,
    /// Commit after every batch. Set from the command line (`-a`).
    pub always_commit: bool,
    pub thumbnail_failure: ThumbnailFailurePolicy,
    pub max_failure_percent: Option<f64>,
    pub submit_retries: u32,
    pub submit_retry_backoff: Duration,
    pub solr_timeout: Duration,
    pub connection_mode: ConnectionMode,
    pub connection_retry: Duration,
}

impl IndexerConfig {
    /// Load and validate a configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(IndexerConfig)` - The validated configuration
    /// * `Err(IndexingError)` - If the file is missing, malformed or invalid
    pub fn from_file(path: &Path) -> Result<Self, IndexingError> {
        let content = fs::read_to_string(path).map_err(|e| {
            IndexingError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(config_file = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, IndexingError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| IndexingError::config(format!("invalid configuration: {}", e)))?;
        Self::validate(file)
    }

    fn validate(file: ConfigFile) -> Result<Self, IndexingError> {
        let solr_server = required(file.solrserver, "solrserver")?;
        let solr_core = required(file.solrcore, "solrcore")?;
        let auth = resolve_auth(
            file.auth_basic_username,
            file.auth_basic_password,
            file.dotenv_path.as_deref(),
        )?;

        let projection = match file.wms_thumbnail_projection {
            Some(name) => name.parse::<Projection>().map_err(IndexingError::config)?,
            None => Projection::default(),
        };

        let thumbnail_impl = match file.thumbnail_impl.as_deref().unwrap_or("legacy") {
            "legacy" => ThumbnailImpl::Legacy,
            "fastapi" => ThumbnailImpl::FastApi {
                host: required(file.thumbnail_api_host, "thumbnail_api_host")?,
                endpoint: required(file.thumbnail_api_endpoint, "thumbnail_api_endpoint")?,
            },
            other => {
                return Err(IndexingError::config(format!(
                    "thumbnail_impl must be 'legacy' or 'fastapi', got '{}'",
                    other
                )))
            }
        };

        let feature_type = match (file.override_feature_type, file.skip_feature_type) {
            (Some(value), _) if !value.trim().is_empty() => {
                FeatureTypePolicy::Override(value.trim().to_string())
            }
            (_, Some(true)) => FeatureTypePolicy::Skip,
            _ => FeatureTypePolicy::Detect,
        };

        let thumbnail_failure = match file.thumbnail_failure.as_deref() {
            None | Some("degrade") => ThumbnailFailurePolicy::Degrade,
            Some("fail") => ThumbnailFailurePolicy::Fail,
            Some(other) => {
                return Err(IndexingError::config(format!(
                    "thumbnail-failure must be 'degrade' or 'fail', got '{}'",
                    other
                )))
            }
        };

        let connection_mode = match file.connection_mode.as_deref() {
            None => ConnectionMode::FailFast,
            Some(value) => value.parse::<ConnectionMode>().map_err(IndexingError::config)?,
        };

        if let Some(max) = file.max_failure_percent {
            if !(0.0..=100.0).contains(&max) {
                return Err(IndexingError::config(format!(
                    "max-failure-percent must be between 0 and 100, got {}",
                    max
                )));
            }
        }

        Ok(Self {
            solr_server,
            solr_core,
            auth,
            projection,
            wms_timeout: Duration::from_secs(
                file.wms_timeout.unwrap_or(DEFAULT_WMS_TIMEOUT_SECS),
            ),
            wms_coastline_layer: file.wms_coastline_layer.filter(|l| !l.trim().is_empty()),
            batch_size: at_least_one(file.batch_size, DEFAULT_BATCH_SIZE, "batch-size")?,
            workers: at_least_one(file.workers, DEFAULT_WORKERS, "workers")?,
            threads: at_least_one(file.threads, DEFAULT_THREADS, "threads")?,
            thumbnail_impl,
            feature_type,
            end_solr_commit: file.end_solr_commit.unwrap_or(false),
            always_commit: false,
            thumbnail_failure,
            max_failure_percent: file.max_failure_percent,
            submit_retries: file.submit_retries.unwrap_or(DEFAULT_SUBMIT_RETRIES),
            submit_retry_backoff: Duration::from_millis(
                file.submit_retry_backoff_ms
                    .unwrap_or(DEFAULT_SUBMIT_RETRY_BACKOFF_MS),
            ),
            solr_timeout: Duration::from_secs(
                file.solr_timeout.unwrap_or(DEFAULT_SOLR_TIMEOUT_SECS),
            ),
            connection_mode,
            connection_retry: Duration::from_secs(
                file.connection_retry_secs
                    .unwrap_or(DEFAULT_CONNECTION_RETRY_SECS),
            ),
        })
    }

    /// Solr connection settings derived from this configuration.
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig::new(&self.solr_server, &self.solr_core)
            .with_auth(self.auth.clone())
            .with_timeout(self.solr_timeout)
            .with_retry(RetryPolicy {
                max_retries: self.submit_retries,
                backoff: self.submit_retry_backoff,
            })
    }

    /// The commit done once at the end of a run, if any.
    ///
    /// Never true together with `always_commit`.
    pub fn commit_at_end(&self) -> bool {
        self.end_solr_commit && !self.always_commit
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, IndexingError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(IndexingError::config(format!("missing required key '{}'", key))),
    }
}

fn at_least_one(value: Option<usize>, default: usize, key: &str) -> Result<usize, IndexingError> {
    match value.unwrap_or(default) {
        0 => Err(IndexingError::config(format!("{} must be at least 1", key))),
        n => Ok(n),
    }
}

/// Credentials come from the config file itself, or from the env file named
/// by `dotenv_path`. Blank values are rejected in both cases.
fn resolve_auth(
    username: Option<String>,
    password: Option<String>,
    dotenv_path: Option<&Path>,
) -> Result<Option<BasicAuth>, IndexingError> {
    match (username, password) {
        (Some(user), Some(pass)) => Ok(Some(non_blank_auth(user, pass)?)),
        (Some(_), None) | (None, Some(_)) => Err(IndexingError::config(
            "auth-basic-username and auth-basic-password must be given together",
        )),
        (None, None) => match dotenv_path {
            Some(path) => read_env_file_auth(path).map(Some),
            None => Ok(None),
        },
    }
}

fn non_blank_auth(username: String, password: String) -> Result<BasicAuth, IndexingError> {
    if username.trim().is_empty() || password.trim().is_empty() {
        return Err(IndexingError::config("Solr credentials must not be blank"));
    }
    Ok(BasicAuth::new(username, password))
}

fn read_env_file_auth(path: &Path) -> Result<BasicAuth, IndexingError> {
    if !path.is_file() {
        return Err(IndexingError::config(format!(
            "dotenv_path {} does not exist",
            path.display()
        )));
    }

    let mut username = None;
    let mut password = None;
    let entries = dotenv::from_path_iter(path)
        .map_err(|e| IndexingError::config(format!("cannot read {}: {}", path.display(), e)))?;
    for entry in entries {
        let (key, value) = entry
            .map_err(|e| IndexingError::config(format!("bad line in {}: {}", path.display(), e)))?;
        match key.as_str() {
            ENV_SOLR_USERNAME => username = Some(value),
            ENV_SOLR_PASSWORD => password = Some(value),
            _ => {}
        }
    }

    match (username, password) {
        (Some(user), Some(pass)) => non_blank_auth(user, pass),
        _ => Err(IndexingError::config(format!(
            "{} and {} must be set in {}",
            ENV_SOLR_USERNAME,
            ENV_SOLR_PASSWORD,
            path.display()
        ))),
    }
}
