//! Command line arguments shared by the binaries.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use tracing::error;

use crate::config::IndexerConfig;
use crate::processor::{BuildMode, BuildOptions};
use crate::thumbnail::{Projection, ThumbnailParams};
use crate::IndexingError;

/// `-c` and `-a`, common to every binary.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Configuration file
    #[arg(short = 'c', long = "cfg", value_name = "CFGFILE")]
    pub config: PathBuf,

    /// Commit to Solr after every batch
    #[arg(short = 'a', long = "always-commit")]
    pub always_commit: bool,
}

impl ConfigArgs {
    /// Load the configuration file and apply `-a`.
    pub fn load(&self) -> Result<IndexerConfig, IndexingError> {
        load_config(&self.config, self.always_commit)
    }
}

pub fn load_config(path: &Path, always_commit: bool) -> Result<IndexerConfig, IndexingError> {
    let mut config = IndexerConfig::from_file(path)?;
    config.always_commit = always_commit;
    Ok(config)
}

/// Thumbnail flags of `indexdata` and `bulkindexer`.
#[derive(Debug, Clone, Default, Args)]
pub struct ThumbnailArgs {
    /// Only create thumbnails and update them in already indexed documents
    #[arg(short = 't', long = "thumbnail-only", conflicts_with = "no_thumbnail")]
    pub thumbnail_only: bool,

    /// Do not create thumbnails
    #[arg(short = 'n', long = "no-thumbnail")]
    pub no_thumbnail: bool,

    /// Map projection of thumbnails (PlateCarree, Mercator, PolarStereographic)
    #[arg(short = 'm', long = "map-projection", value_name = "PROJECTION")]
    pub projection: Option<Projection>,

    /// WMS layer to render
    #[arg(long = "t-layer", value_name = "LAYER")]
    pub layer: Option<String>,

    /// WMS style to render
    #[arg(long = "t-style", value_name = "STYLE")]
    pub style: Option<String>,

    /// Degrees added around the layer extent
    #[arg(long = "t-zl", value_name = "ZOOM", allow_negative_numbers = true)]
    pub zoom_level: Option<f64>,

    /// Overlay coastlines
    #[arg(long = "ac", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub add_coastlines: Option<bool>,

    /// Fixed thumbnail extent in degrees
    #[arg(
        long = "t-extent",
        num_args = 4,
        value_names = ["X0", "X1", "Y0", "Y1"],
        allow_negative_numbers = true
    )]
    pub extent: Option<Vec<f64>>,
}

impl ThumbnailArgs {
    pub fn mode(&self) -> BuildMode {
        if self.thumbnail_only {
            BuildMode::ThumbnailOnly
        } else {
            BuildMode::Full
        }
    }

    /// Whether a thumbnail provider is needed.
    pub fn enabled(&self) -> bool {
        !self.no_thumbnail
    }

    /// Rendering parameters: command line flags over configuration.
    pub fn params(&self, config: &IndexerConfig) -> ThumbnailParams {
        ThumbnailParams {
            projection: self.projection.unwrap_or(config.projection),
            layer: self.layer.clone(),
            style: self.style.clone(),
            zoom_level: self.zoom_level.unwrap_or(0.0),
            extent: self
                .extent
                .as_deref()
                .and_then(|values| <[f64; 4]>::try_from(values).ok()),
            add_coastlines: self.add_coastlines.unwrap_or(false),
            coastline_layer: config.wms_coastline_layer.clone(),
            timeout: config.wms_timeout,
        }
    }

    /// Build options for a run.
    pub fn build_options(&self, config: &IndexerConfig) -> BuildOptions {
        BuildOptions {
            mode: self.mode(),
            feature_type: config.feature_type.clone(),
            thumbnail_failure: config.thumbnail_failure,
            thumbnail_params: Arc::new(self.params(config)),
            network_timeout: config.wms_timeout,
        }
    }
}

/// Log a fatal error and turn a binary's result into its exit status.
pub fn exit_code(result: Result<bool, IndexingError>) -> ExitCode {
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Indexing failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
