//! Thumbnail providers.
//!
//! Two interchangeable implementations share the [`ThumbnailProvider`]
//! contract:
//!
//! - [`EmbeddedThumbnailer`] renders the map through the dataset's WMS and
//!   stores the PNG inline as a base64 data URI (`thumbnail_data`).
//! - [`ServiceThumbnailer`] asks an external thumbnail service to render it
//!   and stores the returned URL (`thumbnail_url`).
//!
//! The variant is chosen once per run by [`from_config`].

mod capabilities;
mod embedded;
mod projection;
mod service;

pub use capabilities::{parse_capabilities, select_layer, select_style, WmsLayer};
pub use embedded::EmbeddedThumbnailer;
pub use projection::{project_extent, thumbnail_extent, Extent, GLOBAL_EXTENT};
pub use service::ServiceThumbnailer;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::IngestError;

/// Document field holding an embedded thumbnail.
pub const THUMBNAIL_DATA_FIELD: &str = "thumbnail_data";

/// Document field holding a thumbnail URL.
pub const THUMBNAIL_URL_FIELD: &str = "thumbnail_url";

/// Map projection of rendered thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    PlateCarree,
    Mercator,
    PolarStereographic,
}

impl Projection {
    /// CRS identifier used in WMS `GetMap` requests.
    pub fn crs(&self) -> &'static str {
        match self {
            Self::PlateCarree => "CRS:84",
            Self::Mercator => "EPSG:3857",
            Self::PolarStereographic => "EPSG:3995",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlateCarree => "PlateCarree",
            Self::Mercator => "Mercator",
            Self::PolarStereographic => "PolarStereographic",
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PlateCarree" => Ok(Self::PlateCarree),
            "Mercator" => Ok(Self::Mercator),
            "PolarStereographic" => Ok(Self::PolarStereographic),
            other => Err(format!(
                "unsupported projection '{}', expected PlateCarree, Mercator or PolarStereographic",
                other
            )),
        }
    }
}

/// Configured thumbnail implementation (`thumbnail_impl`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThumbnailImpl {
    /// Render through WMS and embed the image.
    #[default]
    Legacy,
    /// Delegate to a thumbnail service at `host + endpoint`.
    FastApi { host: String, endpoint: String },
}

/// Rendering parameters shared by every record of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub projection: Projection,
    /// Preferred WMS layer.
    pub layer: Option<String>,
    /// Preferred WMS style.
    pub style: Option<String>,
    /// Degrees added around the layer extent.
    pub zoom_level: f64,
    /// Fixed extent `[x0, x1, y0, y1]` in degrees, instead of the layer's.
    pub extent: Option<Extent>,
    pub add_coastlines: bool,
    /// WMS layer drawn on top when coastlines are requested.
    pub coastline_layer: Option<String>,
    pub timeout: Duration,
}

impl Default for ThumbnailParams {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            layer: None,
            style: None,
            zoom_level: 0.0,
            extent: None,
            add_coastlines: false,
            coastline_layer: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// One thumbnail to produce.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    /// Index id of the record.
    pub id: String,
    /// WMS endpoint from the record's `data_access`.
    pub wms_url: String,
    /// Layers listed in the record, in order.
    pub mmd_layers: Vec<String>,
    pub params: Arc<ThumbnailParams>,
}

/// A produced thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailArtifact {
    /// `data:image/png;base64,...`
    Embedded(String),
    /// Where the thumbnail service stored the image.
    Referenced(String),
}

impl ThumbnailArtifact {
    /// Document field the artifact is stored in.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Embedded(_) => THUMBNAIL_DATA_FIELD,
            Self::Referenced(_) => THUMBNAIL_URL_FIELD,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Embedded(value) | Self::Referenced(value) => value,
        }
    }
}

/// Produces a thumbnail for one record.
#[async_trait]
pub trait ThumbnailProvider: Send + Sync {
    async fn generate(&self, request: &ThumbnailRequest) -> Result<ThumbnailArtifact, IngestError>;
}

/// Build the provider selected by `thumbnail_impl`.
///
/// # Arguments
///
/// * `implementation` - The configured implementation
/// * `timeout` - Timeout applied to every HTTP call of the provider
pub fn from_config(
    implementation: &ThumbnailImpl,
    timeout: Duration,
) -> Result<Arc<dyn ThumbnailProvider>, IngestError> {
    Ok(match implementation {
        ThumbnailImpl::Legacy => Arc::new(EmbeddedThumbnailer::new(timeout)?),
        ThumbnailImpl::FastApi { host, endpoint } => {
            Arc::new(ServiceThumbnailer::new(host, endpoint, timeout)?)
        }
    })
}
