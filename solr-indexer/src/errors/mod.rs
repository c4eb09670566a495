//! Error types for the ingest pipeline.

use std::fmt;

use solr_indexer_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur while ingesting records.
///
/// Setup and source errors abort a run before any work starts. Everything else
/// is scoped to one record or one batch and folded into the run summary.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Bad or missing configuration, or the index is unreachable at startup.
    #[error("Setup error: {0}")]
    SetupError(String),

    /// The input path does not exist.
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// The source produced zero records.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A record could not be parsed or mapped to a document.
    #[error("Build error: {0}")]
    BuildError(String),

    /// Thumbnail rendering or the thumbnail service failed.
    #[error("Thumbnail error: {0}")]
    ThumbnailError(String),

    /// The index refused a batch or was unreachable after retries.
    #[error("Submit error: {0}")]
    SubmitError(String),

    /// A bounded network call ran past its timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Reading a record from disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Create a setup error.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::SetupError(msg.into())
    }

    /// Create a source-not-found error.
    pub fn source_not_found(path: impl fmt::Display) -> Self {
        Self::SourceNotFound(path.to_string())
    }

    /// Create an empty-input error.
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create a build error.
    pub fn build(msg: impl Into<String>) -> Self {
        Self::BuildError(msg.into())
    }

    /// Create a thumbnail error.
    pub fn thumbnail(msg: impl Into<String>) -> Self {
        Self::ThumbnailError(msg.into())
    }

    /// Create a submit error.
    pub fn submit(msg: impl Into<String>) -> Self {
        Self::SubmitError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Classification used when this error is recorded against a record.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::SetupError(_) | Self::SourceNotFound(_) | Self::EmptyInput(_) => {
                FailureKind::Setup
            }
            Self::BuildError(_) | Self::Io(_) => FailureKind::Build,
            Self::ThumbnailError(_) => FailureKind::Thumbnail,
            Self::SubmitError(_) => FailureKind::Submit,
            Self::Timeout(_) => FailureKind::Timeout,
        }
    }
}

impl From<SearchIndexError> for IngestError {
    fn from(err: SearchIndexError) -> Self {
        Self::SubmitError(err.to_string())
    }
}

/// Kind of a per-record failure in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Setup,
    Build,
    Thumbnail,
    Submit,
    Timeout,
    /// The unit holding the record stopped before recording an outcome.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Build => "build",
            Self::Thumbnail => "thumbnail",
            Self::Submit => "submit",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
