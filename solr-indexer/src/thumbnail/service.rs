//! Thumbnails produced by an external thumbnail service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::errors::IngestError;
use crate::thumbnail::projection::Extent;
use crate::thumbnail::{ThumbnailArtifact, ThumbnailProvider, ThumbnailRequest};

/// Body posted to the thumbnail service.
#[derive(Debug, Serialize)]
struct ThumbnailApiRequest<'a> {
    id: &'a str,
    wms_url: &'a str,
    mmd_layers: &'a [String],
    layer: Option<&'a str>,
    style: Option<&'a str>,
    zoom_level: f64,
    projection: &'static str,
    extent: Option<Extent>,
    add_coastlines: bool,
}

impl<'a> From<&'a ThumbnailRequest> for ThumbnailApiRequest<'a> {
    fn from(request: &'a ThumbnailRequest) -> Self {
        let params = &request.params;
        Self {
            id: &request.id,
            wms_url: &request.wms_url,
            mmd_layers: &request.mmd_layers,
            layer: params.layer.as_deref(),
            style: params.style.as_deref(),
            zoom_level: params.zoom_level,
            projection: params.projection.as_str(),
            extent: params.extent,
            add_coastlines: params.add_coastlines,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThumbnailApiResponse {
    data: Option<ThumbnailApiData>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailApiData {
    url: Option<String>,
    message: Option<String>,
}

/// Calls `host + endpoint` and stores the returned URL.
pub struct ServiceThumbnailer {
    client: Client,
    url: String,
}

impl ServiceThumbnailer {
    pub fn new(host: &str, endpoint: &str, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::setup(format!("cannot build thumbnail API client: {}", e)))?;
        let url = Url::parse(&format!("{}{}", host.trim(), endpoint.trim()))
            .map_err(|e| IngestError::setup(format!("invalid thumbnail API URL: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn thumbnail_url(response: ThumbnailApiResponse) -> Result<String, IngestError> {
    let data = response
        .data
        .ok_or_else(|| IngestError::thumbnail("thumbnail API response without data"))?;
    match data.url {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(IngestError::thumbnail(format!(
            "thumbnail API returned no URL: {}",
            data.message.unwrap_or_else(|| "no message".to_string())
        ))),
    }
}

#[async_trait]
impl ThumbnailProvider for ServiceThumbnailer {
    #[instrument(skip(self, request), fields(id = %request.id))]
    async fn generate(&self, request: &ThumbnailRequest) -> Result<ThumbnailArtifact, IngestError> {
        debug!(url = %self.url, "Calling thumbnail API");
        let response = self
            .client
            .post(&self.url)
            .json(&ThumbnailApiRequest::from(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IngestError::timeout(format!("thumbnail API at {} timed out", self.url))
                } else {
                    IngestError::thumbnail(format!("could not contact thumbnail API: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::thumbnail(format!(
                "thumbnail API returned status {}",
                status
            )));
        }

        let body: ThumbnailApiResponse = response
            .json()
            .await
            .map_err(|e| IngestError::thumbnail(format!("invalid thumbnail API response: {}", e)))?;
        thumbnail_url(body).map(ThumbnailArtifact::Referenced)
    }
}
