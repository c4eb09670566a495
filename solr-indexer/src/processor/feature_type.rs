//! Feature type classification.
//!
//! The feature type (CF `featureType` global attribute) is read from the
//! OPeNDAP attribute description of a dataset, unless the run forces or skips
//! it.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::errors::IngestError;

/// Feature types defined by the CF conventions.
pub const VALID_FEATURE_TYPES: [&str; 6] = [
    "point",
    "timeSeries",
    "trajectory",
    "profile",
    "timeSeriesProfile",
    "trajectoryProfile",
];

static DAS_FEATURE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*String\s+featureType\s+"([^"]*)"\s*;"#).expect("valid DAS regex")
});

/// How the feature type is decided for the records of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeatureTypePolicy {
    /// Detect per record from the OPeNDAP endpoint.
    #[default]
    Detect,
    /// Never set a feature type.
    Skip,
    /// Use this value for every record, without detection.
    Override(String),
}

/// Reads the feature type of a dataset from its OPeNDAP endpoint.
#[async_trait]
pub trait FeatureTypeDetector: Send + Sync {
    async fn detect(&self, opendap_url: &str) -> Result<String, IngestError>;
}

/// Fix known misspellings of feature types.
///
/// Unknown values are returned unchanged.
pub fn normalize_feature_type(raw: &str) -> String {
    let value = raw.trim();
    if VALID_FEATURE_TYPES.contains(&value) {
        return value.to_string();
    }
    if value.eq_ignore_ascii_case("timeseries") || value == "timseries" {
        debug!(feature_type = %value, "Normalised feature type to timeSeries");
        return "timeSeries".to_string();
    }
    warn!(feature_type = %value, "Feature type is not a valid CF feature type");
    value.to_string()
}

/// Extract the global `featureType` from a DAS response body.
pub fn feature_type_from_das(das: &str) -> Option<String> {
    let globals = das.find("NC_GLOBAL").map(|at| &das[at..]).unwrap_or(das);
    DAS_FEATURE_TYPE
        .captures(globals)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Detector that fetches `<url>.das` over HTTP.
pub struct DasFeatureTypeDetector {
    client: Client,
}

impl DasFeatureTypeDetector {
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::setup(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeatureTypeDetector for DasFeatureTypeDetector {
    async fn detect(&self, opendap_url: &str) -> Result<String, IngestError> {
        let url = format!("{}.das", opendap_url.trim().trim_end_matches(".html"));
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                IngestError::timeout(format!("{}: {}", url, e))
            } else {
                IngestError::build(format!("{}: {}", url, e))
            }
        })?;
        if !response.status().is_success() {
            return Err(IngestError::build(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| IngestError::build(e.to_string()))?;

        feature_type_from_das(&body)
            .map(|raw| normalize_feature_type(&raw))
            .ok_or_else(|| IngestError::build(format!("no featureType attribute in {}", url)))
    }
}
