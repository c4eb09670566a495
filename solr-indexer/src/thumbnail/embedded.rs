//! Thumbnails rendered through the dataset's own WMS.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::errors::IngestError;
use crate::thumbnail::capabilities::{parse_capabilities, select_layer, select_style};
use crate::thumbnail::projection::{project_extent, thumbnail_extent};
use crate::thumbnail::{ThumbnailArtifact, ThumbnailProvider, ThumbnailRequest};

const WMS_VERSION: &str = "1.3.0";
const THUMBNAIL_SIZE: u32 = 450;
const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Renders a `GetMap` PNG and embeds it as a data URI.
pub struct EmbeddedThumbnailer {
    client: Client,
}

impl EmbeddedThumbnailer {
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::setup(format!("cannot build WMS client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response, IngestError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        if !response.status().is_success() {
            return Err(IngestError::thumbnail(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }
}

fn request_error(url: &str, error: reqwest::Error) -> IngestError {
    if error.is_timeout() {
        IngestError::timeout(format!("WMS request to {} timed out", url))
    } else {
        IngestError::thumbnail(format!("WMS request to {} failed: {}", url, error))
    }
}

/// The WMS endpoint without any request parameters.
pub(crate) fn base_url(wms_url: &str) -> &str {
    wms_url.split('?').next().unwrap_or(wms_url).trim()
}

pub(crate) fn to_data_uri(png: &[u8]) -> Result<String, IngestError> {
    if !png.starts_with(&PNG_MAGIC) {
        return Err(IngestError::thumbnail("GetMap did not return a PNG image"));
    }
    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png)
    ))
}

#[async_trait]
impl ThumbnailProvider for EmbeddedThumbnailer {
    #[instrument(skip(self, request), fields(id = %request.id))]
    async fn generate(&self, request: &ThumbnailRequest) -> Result<ThumbnailArtifact, IngestError> {
        let url = base_url(&request.wms_url);
        let params = &request.params;

        let capabilities = self
            .fetch(
                url,
                &[
                    ("service", "WMS".to_string()),
                    ("version", WMS_VERSION.to_string()),
                    ("request", "GetCapabilities".to_string()),
                ],
            )
            .await?
            .text()
            .await
            .map_err(|e| request_error(url, e))?;
        let layers = parse_capabilities(&capabilities)?;
        if layers.is_empty() {
            return Err(IngestError::thumbnail(format!("no layers offered by {}", url)));
        }

        let layer = select_layer(&layers, params.layer.as_deref(), &request.mmd_layers)
            .ok_or_else(|| IngestError::thumbnail(format!("no usable layer offered by {}", url)))?;
        let style = select_style(layer, params.style.as_deref()).unwrap_or_default();
        let extent = thumbnail_extent(
            params.extent,
            layer.bbox.or(layers[0].bbox),
            params.zoom_level,
        );
        let bbox = project_extent(params.projection, extent);

        let mut layer_names = layer.name.clone();
        let mut styles = style.to_string();
        if params.add_coastlines {
            if let Some(coastlines) = &params.coastline_layer {
                layer_names.push(',');
                layer_names.push_str(coastlines);
                styles.push(',');
            }
        }
        debug!(
            layer = %layer_names,
            style = %styles,
            extent = ?extent,
            crs = params.projection.crs(),
            "Requesting WMS map"
        );

        let bytes = self
            .fetch(
                url,
                &[
                    ("service", "WMS".to_string()),
                    ("version", WMS_VERSION.to_string()),
                    ("request", "GetMap".to_string()),
                    ("layers", layer_names),
                    ("styles", styles),
                    ("crs", params.projection.crs().to_string()),
                    (
                        "bbox",
                        bbox.iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                    ),
                    ("width", THUMBNAIL_SIZE.to_string()),
                    ("height", THUMBNAIL_SIZE.to_string()),
                    ("format", "image/png".to_string()),
                    ("transparent", "true".to_string()),
                ],
            )
            .await?
            .bytes()
            .await
            .map_err(|e| request_error(url, e))?;

        Ok(ThumbnailArtifact::Embedded(to_data_uri(&bytes)?))
    }
}
