//! Record source for the ingest pipeline.
//!
//! Enumerates input records from a single file, a list file or a directory
//! and hands them out one at a time through a shared [`RecordQueue`].

use std::fmt;
use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::IngestError;

/// Extension of metadata records picked up from directories.
const RECORD_EXTENSION: &str = "xml";

/// One input metadata unit, as claimed by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Path of the record on disk.
    pub path: PathBuf,
    /// Claim order within the run, starting at 0.
    pub sequence: u64,
}

impl Record {
    /// Label used in logs and the run summary.
    pub fn label(&self) -> String {
        self.path.display().to_string()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Where records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    /// One record file.
    SingleFile(PathBuf),
    /// A text file listing one record path per line.
    ListFile(PathBuf),
    /// All `*.xml` files in a directory.
    Directory { path: PathBuf, recursive: bool },
}

/// Enumerates the records of a run.
#[derive(Debug, Clone)]
pub struct RecordSource {
    mode: SourceMode,
}

/// Lazy sequence of record paths.
pub struct RecordStream {
    inner: Peekable<Box<dyn Iterator<Item = PathBuf> + Send>>,
}

impl RecordStream {
    fn new(iter: Box<dyn Iterator<Item = PathBuf> + Send>) -> Self {
        Self {
            inner: iter.peekable(),
        }
    }

    fn is_empty(&mut self) -> bool {
        self.inner.peek().is_none()
    }
}

impl Iterator for RecordStream {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        self.inner.next()
    }
}

impl RecordSource {
    pub fn single_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: SourceMode::SingleFile(path.into()),
        }
    }

    pub fn list_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: SourceMode::ListFile(path.into()),
        }
    }

    pub fn directory(path: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            mode: SourceMode::Directory {
                path: path.into(),
                recursive,
            },
        }
    }

    pub fn mode(&self) -> &SourceMode {
        &self.mode
    }

    /// Open the source.
    ///
    /// # Returns
    ///
    /// * `Ok(RecordStream)` - A non-empty stream of record paths
    /// * `Err(IngestError::SourceNotFound)` - If the input path does not exist
    /// * `Err(IngestError::EmptyInput)` - If the source yields no records
    pub fn open(&self) -> Result<RecordStream, IngestError> {
        let mut stream = match &self.mode {
            SourceMode::SingleFile(path) => {
                Self::require_exists(path)?;
                RecordStream::new(Box::new(std::iter::once(path.clone())))
            }
            SourceMode::ListFile(path) => {
                Self::require_exists(path)?;
                let records = Self::read_list_file(path)?;
                info!(list_file = %path.display(), count = records.len(), "Read list file");
                RecordStream::new(Box::new(records.into_iter()))
            }
            SourceMode::Directory { path, recursive } => {
                Self::require_exists(path)?;
                if !path.is_dir() {
                    return Err(IngestError::source_not_found(format!(
                        "{} is not a directory",
                        path.display()
                    )));
                }
                RecordStream::new(Box::new(Self::walk_directory(path, *recursive)))
            }
        };

        if stream.is_empty() {
            return Err(IngestError::empty_input(format!(
                "no records found in {:?}",
                self.mode
            )));
        }
        Ok(stream)
    }

    fn require_exists(path: &Path) -> Result<(), IngestError> {
        if path.exists() {
            Ok(())
        } else {
            Err(IngestError::source_not_found(path.display()))
        }
    }

    /// Read a list file: one path per line, trimmed, blank lines ignored.
    fn read_list_file(path: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let content = fs::read_to_string(path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn walk_directory(path: &Path, recursive: bool) -> impl Iterator<Item = PathBuf> + Send {
        let mut walker = WalkDir::new(path).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }
        walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == RECORD_EXTENSION)
                    .unwrap_or(false)
            })
    }
}

/// Paths read ahead of the claiming units.
const PREFETCH: usize = 256;

struct QueueState {
    pending: mpsc::Receiver<PathBuf>,
    next_sequence: u64,
    closed: bool,
}

/// Shared, mutually exclusive claim point over a [`RecordStream`].
///
/// The stream is advanced on a blocking thread, so directory walks never run
/// on a runtime worker. Each record is handed to exactly one caller of
/// [`RecordQueue::claim`].
pub struct RecordQueue {
    state: Mutex<QueueState>,
}

impl RecordQueue {
    /// Start reading `stream` in the background. Must be called from within a
    /// tokio runtime.
    pub fn new(stream: RecordStream) -> Self {
        let (tx, rx) = mpsc::channel(PREFETCH);
        tokio::task::spawn_blocking(move || {
            for path in stream {
                if tx.blocking_send(path).is_err() {
                    debug!("Record queue closed, stopping enumeration");
                    break;
                }
            }
        });
        Self {
            state: Mutex::new(QueueState {
                pending: rx,
                next_sequence: 0,
                closed: false,
            }),
        }
    }

    /// Claim the next unclaimed record, or `None` once the source is
    /// exhausted or the queue has been closed.
    pub async fn claim(&self) -> Option<Record> {
        let mut state = self.state.lock().await;
        if state.closed {
            return None;
        }
        let path = state.pending.recv().await?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        debug!(record = %path.display(), sequence, "Claimed record");
        Some(Record { path, sequence })
    }

    /// Stop handing out records. Records already claimed are unaffected.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.pending.close();
    }

    /// Number of records claimed so far.
    pub async fn claimed(&self) -> u64 {
        self.state.lock().await.next_sequence
    }
}
