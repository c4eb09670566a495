//! Document builder implementation.
//!
//! Turns one MMD record into an index document, with feature type and
//! thumbnail enrichment.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use solr_indexer_repository::to_solr_id;
use solr_indexer_shared::types::solr_document::IS_PARENT_FIELD;
use solr_indexer_shared::SolrDocument;
use tracing::{debug, info, instrument, warn};

use crate::errors::IngestError;
use crate::processor::feature_type::{FeatureTypeDetector, FeatureTypePolicy};
use crate::processor::mmd;
use crate::source::Record;
use crate::thumbnail::{ThumbnailParams, ThumbnailProvider, ThumbnailRequest};
use crate::xml::Element;

const RELATED_DATASET_FIELD: &str = "related_dataset";
const RELATED_DATASET_ID_FIELD: &str = "related_dataset_id";
const WMS_URL_FIELD: &str = "data_access_url_ogc_wms";
const WMS_LAYERS_FIELD: &str = "data_access_wms_layers";
const OPENDAP_URL_FIELD: &str = "data_access_url_opendap";
const FEATURE_TYPE_FIELD: &str = "feature_type";

/// Prefixes some providers put in front of parent identifiers.
const PARENT_ID_PREFIXES: [&str; 3] = [
    "https://data.npolar.no/dataset/",
    "http://data.npolar.no/dataset/",
    "http://api.npolar.no/dataset/",
];

/// What to do with a record whose thumbnail cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailFailurePolicy {
    /// Index the record without a thumbnail.
    #[default]
    Degrade,
    /// Fail the record.
    Fail,
}

/// Which part of a record is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// The full document.
    #[default]
    Full,
    /// Only the thumbnail field, as an atomic update of an indexed document.
    ThumbnailOnly,
}

/// Per-run settings of the [`DocumentBuilder`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: BuildMode,
    pub feature_type: FeatureTypePolicy,
    pub thumbnail_failure: ThumbnailFailurePolicy,
    pub thumbnail_params: Arc<ThumbnailParams>,
    /// Bound on each feature type or thumbnail call.
    pub network_timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::Full,
            feature_type: FeatureTypePolicy::Detect,
            thumbnail_failure: ThumbnailFailurePolicy::Degrade,
            thumbnail_params: Arc::new(ThumbnailParams::default()),
            network_timeout: Duration::from_secs(120),
        }
    }
}

/// A document ready for the batch accumulator.
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub document: SolrDocument,
    /// Index id of the parent dataset, for child records.
    pub parent_id: Option<String>,
}

/// Result of building one record.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Document(BuiltDocument),
    /// The record is intentionally not indexed.
    Skipped { reason: String },
}

impl BuildOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Builds index documents from MMD records.
///
/// The builder holds no per-record state; one instance is shared by every
/// unit of the worker pool.
pub struct DocumentBuilder {
    options: BuildOptions,
    thumbnails: Option<Arc<dyn ThumbnailProvider>>,
    feature_types: Option<Arc<dyn FeatureTypeDetector>>,
}

impl DocumentBuilder {
    /// Create a new document builder.
    ///
    /// # Arguments
    ///
    /// * `options` - Per-run build settings
    /// * `thumbnails` - Thumbnail provider, `None` to never produce thumbnails
    /// * `feature_types` - Feature type detector, `None` to never detect
    pub fn new(
        options: BuildOptions,
        thumbnails: Option<Arc<dyn ThumbnailProvider>>,
        feature_types: Option<Arc<dyn FeatureTypeDetector>>,
    ) -> Self {
        Self {
            options,
            thumbnails,
            feature_types,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Read a record from disk and build its document.
    #[instrument(skip(self), fields(record = %record))]
    pub async fn build(&self, record: &Record) -> Result<BuildOutcome, IngestError> {
        let xml = tokio::fs::read_to_string(&record.path).await?;
        self.build_from_str(&xml).await
    }

    /// Build a document from MMD text.
    ///
    /// # Returns
    ///
    /// * `Ok(BuildOutcome::Document)` - The document and its parent id
    /// * `Ok(BuildOutcome::Skipped)` - The record has no usable identifier, or
    ///   has nothing to do in thumbnail-only mode
    /// * `Err(IngestError)` - The record cannot be parsed or mapped, or its
    ///   thumbnail failed under [`ThumbnailFailurePolicy::Fail`]
    pub async fn build_from_str(&self, xml: &str) -> Result<BuildOutcome, IngestError> {
        let root = mmd::parse(xml)?;
        for element in mmd::missing_required(&root) {
            warn!(element = element, "Required MMD element missing, using '{}'", mmd::UNKNOWN);
        }

        if self.options.mode == BuildMode::ThumbnailOnly {
            return self.build_thumbnail_only(&root).await;
        }

        let mut doc = mmd::to_solr(&root)?;
        match doc.metadata_identifier() {
            Some(id) if id != mmd::UNKNOWN => {}
            _ => return Ok(BuildOutcome::skipped("no metadata_identifier")),
        }

        let parent_id = apply_relations(&mut doc);
        self.apply_feature_type(&mut doc).await;
        self.apply_thumbnail(&mut doc).await?;

        debug!(id = ?doc.id(), fields = doc.len(), "Built document");
        Ok(BuildOutcome::Document(BuiltDocument {
            document: doc,
            parent_id,
        }))
    }

    async fn build_thumbnail_only(&self, root: &Element) -> Result<BuildOutcome, IngestError> {
        let access = mmd::access_document(root);
        let Some(id) = access
            .id()
            .filter(|_| access.metadata_identifier() != Some(mmd::UNKNOWN))
        else {
            return Ok(BuildOutcome::skipped("no metadata_identifier"));
        };
        let Some(thumbnails) = &self.thumbnails else {
            return Ok(BuildOutcome::skipped("thumbnails disabled"));
        };
        let Some(request) = self.thumbnail_request(&access) else {
            return Ok(BuildOutcome::skipped("no WMS data access"));
        };

        let artifact = self
            .bounded("thumbnail", thumbnails.generate(&request))
            .await?;
        let mut doc = SolrDocument::partial(id);
        doc.set_atomic(artifact.field(), artifact.value());
        info!(id = %id, field = artifact.field(), "Built thumbnail update");
        Ok(BuildOutcome::Document(BuiltDocument {
            document: doc,
            parent_id: None,
        }))
    }

    fn thumbnail_request(&self, doc: &SolrDocument) -> Option<ThumbnailRequest> {
        Some(ThumbnailRequest {
            id: doc.id()?.to_string(),
            wms_url: doc.get_str(WMS_URL_FIELD)?.to_string(),
            mmd_layers: doc.get_str_list(WMS_LAYERS_FIELD),
            params: Arc::clone(&self.options.thumbnail_params),
        })
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, IngestError>>,
    ) -> Result<T, IngestError> {
        let timeout = self.options.network_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(IngestError::timeout(format!(
                "{} did not complete within {}s",
                what,
                timeout.as_secs()
            ))),
        }
    }

    async fn apply_feature_type(&self, doc: &mut SolrDocument) {
        match &self.options.feature_type {
            FeatureTypePolicy::Override(value) => doc.set(FEATURE_TYPE_FIELD, value.as_str()),
            FeatureTypePolicy::Skip => {}
            FeatureTypePolicy::Detect => {
                let (Some(detector), Some(url)) =
                    (&self.feature_types, doc.get_str(OPENDAP_URL_FIELD))
                else {
                    return;
                };
                let url = url.to_string();
                match self.bounded("feature type detection", detector.detect(&url)).await {
                    Ok(feature_type) => doc.set(FEATURE_TYPE_FIELD, feature_type),
                    Err(e) => {
                        warn!(id = ?doc.id(), url = %url, error = %e, "Feature type not detected")
                    }
                }
            }
        }
    }

    async fn apply_thumbnail(&self, doc: &mut SolrDocument) -> Result<(), IngestError> {
        let Some(thumbnails) = &self.thumbnails else {
            return Ok(());
        };
        let Some(request) = self.thumbnail_request(doc) else {
            return Ok(());
        };

        match self.bounded("thumbnail", thumbnails.generate(&request)).await {
            Ok(artifact) => {
                doc.set(artifact.field(), artifact.value());
                Ok(())
            }
            Err(e) => match self.options.thumbnail_failure {
                ThumbnailFailurePolicy::Degrade => {
                    warn!(id = %request.id, error = %e, "Thumbnail failed, indexing without it");
                    doc.remove(WMS_URL_FIELD);
                    Ok(())
                }
                ThumbnailFailurePolicy::Fail => Err(e),
            },
        }
    }
}

fn clean_parent_id(raw: &str) -> String {
    let mut id = raw.trim();
    for prefix in PARENT_ID_PREFIXES {
        id = id.strip_prefix(prefix).unwrap_or(id);
    }
    id.replace(".xml", "").trim().to_string()
}

/// Mark the document as parent-less or as a child. Returns the index id of
/// the parent for children.
fn apply_relations(doc: &mut SolrDocument) -> Option<String> {
    let related = doc.get_str(RELATED_DATASET_FIELD).map(clean_parent_id);
    match related {
        Some(parent) if parent.contains("doi.org") => {
            debug!(related = %parent, "Ignoring DOI as related dataset");
            doc.remove(RELATED_DATASET_ID_FIELD);
            set_level_one(doc);
            None
        }
        Some(parent) if !parent.is_empty() => {
            let parent_id = to_solr_id(&parent);
            doc.set(RELATED_DATASET_FIELD, parent.as_str());
            doc.set(RELATED_DATASET_ID_FIELD, parent_id.as_str());
            doc.set("isChild", true);
            doc.set(IS_PARENT_FIELD, false);
            doc.set("dataset_type", "Level-2");
            Some(parent_id)
        }
        _ => {
            set_level_one(doc);
            None
        }
    }
}

fn set_level_one(doc: &mut SolrDocument) {
    doc.set("dataset_type", "Level-1");
    doc.set(IS_PARENT_FIELD, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::mmd::tests::sample_mmd;
    use crate::thumbnail::ThumbnailArtifact;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticThumbnails {
        result: Result<ThumbnailArtifact, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl StaticThumbnails {
        fn ok(url: &str) -> Self {
            Self {
                result: Ok(ThumbnailArtifact::Referenced(url.to_string())),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err("WMS down".to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::ok("https://thumbs/late.png")
            }
        }
    }

    #[async_trait]
    impl ThumbnailProvider for StaticThumbnails {
        async fn generate(
            &self,
            _request: &ThumbnailRequest,
        ) -> Result<ThumbnailArtifact, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone().map_err(IngestError::thumbnail)
        }
    }

    struct StaticFeatureType(&'static str);

    #[async_trait]
    impl FeatureTypeDetector for StaticFeatureType {
        async fn detect(&self, _opendap_url: &str) -> Result<String, IngestError> {
            Ok(self.0.to_string())
        }
    }

    fn builder_with(
        options: BuildOptions,
        thumbnails: Option<Arc<dyn ThumbnailProvider>>,
    ) -> DocumentBuilder {
        DocumentBuilder::new(options, thumbnails, None)
    }

    fn document(outcome: BuildOutcome) -> BuiltDocument {
        match outcome {
            BuildOutcome::Document(doc) => doc,
            BuildOutcome::Skipped { reason } => panic!("unexpected skip: {}", reason),
        }
    }

    #[tokio::test]
    async fn test_build_level_one_document() {
        let builder = builder_with(BuildOptions::default(), None);
        let built = document(builder.build_from_str(&sample_mmd("no.met:a")).await.unwrap());

        assert_eq!(built.parent_id, None);
        assert_eq!(built.document.get_str("dataset_type"), Some("Level-1"));
        assert!(!built.document.is_parent());
        assert!(built.document.contains(WMS_URL_FIELD));
    }

    #[tokio::test]
    async fn test_child_reports_cleaned_parent() {
        let xml = sample_mmd("no.met:child").replace(
            "</mmd:mmd>",
            "<mmd:related_dataset relation_type=\"parent\">https://data.npolar.no/dataset/abc.xml</mmd:related_dataset></mmd:mmd>",
        );
        let builder = builder_with(BuildOptions::default(), None);
        let built = document(builder.build_from_str(&xml).await.unwrap());

        assert_eq!(built.parent_id.as_deref(), Some("abc"));
        assert_eq!(built.document.get_str(RELATED_DATASET_FIELD), Some("abc"));
        assert_eq!(built.document.get_str("dataset_type"), Some("Level-2"));
        assert_eq!(built.document.get("isChild"), Some(&serde_json::Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_doi_parent_is_ignored() {
        let xml = sample_mmd("no.met:child").replace(
            "</mmd:mmd>",
            "<mmd:related_dataset>https://doi.org/10.1/xyz</mmd:related_dataset></mmd:mmd>",
        );
        let builder = builder_with(BuildOptions::default(), None);
        let built = document(builder.build_from_str(&xml).await.unwrap());

        assert_eq!(built.parent_id, None);
        assert!(!built.document.contains(RELATED_DATASET_ID_FIELD));
        assert_eq!(built.document.get_str("dataset_type"), Some("Level-1"));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_skipped() {
        let xml = sample_mmd("").replace("<mmd:metadata_identifier></mmd:metadata_identifier>", "");
        let builder = builder_with(BuildOptions::default(), None);
        let outcome = builder.build_from_str(&xml).await.unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_invalid_xml_is_build_error() {
        let builder = builder_with(BuildOptions::default(), None);
        let result = builder.build_from_str("<mmd><title>broken</mmd>").await;
        assert!(matches!(result, Err(IngestError::BuildError(_))));
    }

    #[tokio::test]
    async fn test_thumbnail_url_is_set() {
        let thumbnails = Arc::new(StaticThumbnails::ok("https://thumbs/a.png"));
        let builder = builder_with(BuildOptions::default(), Some(thumbnails.clone()));
        let built = document(builder.build_from_str(&sample_mmd("a")).await.unwrap());

        assert_eq!(built.document.get_str("thumbnail_url"), Some("https://thumbs/a.png"));
        assert_eq!(thumbnails.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_degrades() {
        let builder = builder_with(
            BuildOptions::default(),
            Some(Arc::new(StaticThumbnails::failing())),
        );
        let built = document(builder.build_from_str(&sample_mmd("a")).await.unwrap());

        assert!(!built.document.contains("thumbnail_url"));
        assert!(!built.document.contains(WMS_URL_FIELD));
    }

    #[tokio::test]
    async fn test_thumbnail_failure_fails_when_configured() {
        let options = BuildOptions {
            thumbnail_failure: ThumbnailFailurePolicy::Fail,
            ..BuildOptions::default()
        };
        let builder = builder_with(options, Some(Arc::new(StaticThumbnails::failing())));
        let result = builder.build_from_str(&sample_mmd("a")).await;
        assert!(matches!(result, Err(IngestError::ThumbnailError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_thumbnail_timeout_degrades() {
        let options = BuildOptions {
            network_timeout: Duration::from_secs(5),
            ..BuildOptions::default()
        };
        let builder = builder_with(
            options,
            Some(Arc::new(StaticThumbnails::slow(Duration::from_secs(60)))),
        );
        let built = document(builder.build_from_str(&sample_mmd("a")).await.unwrap());
        assert!(!built.document.contains("thumbnail_url"));
    }

    #[tokio::test]
    async fn test_thumbnail_only_builds_atomic_update() {
        let options = BuildOptions {
            mode: BuildMode::ThumbnailOnly,
            ..BuildOptions::default()
        };
        let builder = builder_with(options, Some(Arc::new(StaticThumbnails::ok("https://t/a.png"))));
        let built = document(builder.build_from_str(&sample_mmd("no.met:a")).await.unwrap());

        assert_eq!(built.document.id(), Some("no-met-a"));
        assert_eq!(built.document.len(), 2);
        assert_eq!(
            built.document.get("thumbnail_url"),
            Some(&serde_json::json!({"set": "https://t/a.png"}))
        );
    }

    #[tokio::test]
    async fn test_thumbnail_only_failure_fails_record() {
        let options = BuildOptions {
            mode: BuildMode::ThumbnailOnly,
            ..BuildOptions::default()
        };
        let builder = builder_with(options, Some(Arc::new(StaticThumbnails::failing())));
        assert!(builder.build_from_str(&sample_mmd("a")).await.is_err());
    }

    #[tokio::test]
    async fn test_feature_type_policies() {
        let detector: Arc<dyn FeatureTypeDetector> = Arc::new(StaticFeatureType("timeSeries"));

        let detect = DocumentBuilder::new(BuildOptions::default(), None, Some(detector.clone()));
        let built = document(detect.build_from_str(&sample_mmd("a")).await.unwrap());
        assert_eq!(built.document.get_str(FEATURE_TYPE_FIELD), Some("timeSeries"));

        let skip = DocumentBuilder::new(
            BuildOptions {
                feature_type: FeatureTypePolicy::Skip,
                ..BuildOptions::default()
            },
            None,
            Some(detector.clone()),
        );
        let built = document(skip.build_from_str(&sample_mmd("a")).await.unwrap());
        assert!(!built.document.contains(FEATURE_TYPE_FIELD));

        let forced = DocumentBuilder::new(
            BuildOptions {
                feature_type: FeatureTypePolicy::Override("trajectory".to_string()),
                ..BuildOptions::default()
            },
            None,
            Some(detector),
        );
        let built = document(forced.build_from_str(&sample_mmd("a")).await.unwrap());
        assert_eq!(built.document.get_str(FEATURE_TYPE_FIELD), Some("trajectory"));
    }

    #[test]
    fn test_clean_parent_id() {
        assert_eq!(clean_parent_id(" http://api.npolar.no/dataset/x-1.xml "), "x-1");
        assert_eq!(clean_parent_id("no.met:parent"), "no.met:parent");
    }
}
