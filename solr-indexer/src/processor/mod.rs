//! Document building for the ingest pipeline.
//!
//! Parses MMD records, maps them to index documents and enriches them with
//! feature type and thumbnail.

pub mod dates;
mod document_builder;
pub mod feature_type;
pub mod mmd;

pub use document_builder::{
    BuildMode, BuildOptions, BuildOutcome, BuiltDocument, DocumentBuilder, ThumbnailFailurePolicy,
};
pub use feature_type::{DasFeatureTypeDetector, FeatureTypeDetector, FeatureTypePolicy};
