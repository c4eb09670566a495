//! Integration tests for the run coordinator.
//!
//! These tests use the real RunCoordinator, DocumentBuilder and record files
//! on disk, with mock index and thumbnail providers.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solr_indexer::errors::IngestError;
use solr_indexer::orchestrator::{PoolConfig, RunCoordinator, RunState};
use solr_indexer::processor::{BuildOptions, DocumentBuilder};
use solr_indexer::source::RecordSource;
use solr_indexer::summary::ExitPolicy;
use solr_indexer::thumbnail::{ThumbnailArtifact, ThumbnailProvider, ThumbnailRequest};
use solr_indexer_repository::{
    BatchOperationSummary, ParentMarkOutcome, SearchIndexError, SearchIndexProvider,
    SearchIndexService,
};
use solr_indexer_shared::{FieldQuery, SearchResponse, SolrDocument};
use tempfile::TempDir;
use tokio::sync::Mutex;

/// In-memory index recording every call.
#[derive(Default)]
struct MockIndex {
    stored: Mutex<HashMap<String, SolrDocument>>,
    batches: Mutex<Vec<Vec<String>>>,
    updates: Mutex<Vec<String>>,
    commits: Mutex<usize>,
    /// Every provider call in order.
    calls: Mutex<Vec<&'static str>>,
    /// Number of batches accepted before the index becomes unreachable.
    reachable_batches: Option<usize>,
    panic_on_add: bool,
}

impl MockIndex {
    async fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().await.iter().map(Vec::len).collect()
    }

    async fn stored_ids(&self) -> HashSet<String> {
        self.stored.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl SearchIndexProvider for MockIndex {
    async fn ping(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn add_documents(
        &self,
        documents: &[SolrDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.calls.lock().await.push("add");
        if self.panic_on_add {
            panic!("index client crashed");
        }
        if let Some(limit) = self.reachable_batches {
            if self.batches.lock().await.len() >= limit {
                return Err(SearchIndexError::connection("connection refused"));
            }
        }
        let mut stored = self.stored.lock().await;
        let mut ids = Vec::with_capacity(documents.len());
        for doc in documents {
            let id = doc.id().unwrap_or_default().to_string();
            stored.insert(id.clone(), doc.clone());
            ids.push(id);
        }
        self.batches.lock().await.push(ids.clone());
        Ok(BatchOperationSummary::all_succeeded(ids.iter().map(String::as_str)))
    }

    async fn commit(&self) -> Result<(), SearchIndexError> {
        self.calls.lock().await.push("commit");
        *self.commits.lock().await += 1;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<SolrDocument>, SearchIndexError> {
        Ok(self.stored.lock().await.get(id).cloned())
    }

    async fn update_document(&self, document: &SolrDocument) -> Result<(), SearchIndexError> {
        self.calls.lock().await.push("update");
        let id = document.id().unwrap_or_default().to_string();
        self.updates.lock().await.push(id.clone());
        self.stored.lock().await.insert(id, document.clone());
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<(), SearchIndexError> {
        self.stored.lock().await.remove(id);
        Ok(())
    }

    async fn search(&self, _query: &FieldQuery) -> Result<SearchResponse, SearchIndexError> {
        Ok(SearchResponse::empty())
    }
}

/// Thumbnail service that hangs for one dataset.
struct MockThumbnailService {
    hang_for: String,
}

#[async_trait]
impl ThumbnailProvider for MockThumbnailService {
    async fn generate(&self, request: &ThumbnailRequest) -> Result<ThumbnailArtifact, IngestError> {
        if request.id == self.hang_for {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(ThumbnailArtifact::Referenced(format!(
            "https://thumbnails.example.org/{}.png",
            request.id
        )))
    }
}

/// Thumbnail service that takes a while for every record.
struct SlowThumbnailService {
    delay: Duration,
}

#[async_trait]
impl ThumbnailProvider for SlowThumbnailService {
    async fn generate(&self, request: &ThumbnailRequest) -> Result<ThumbnailArtifact, IngestError> {
        tokio::time::sleep(self.delay).await;
        Ok(ThumbnailArtifact::Referenced(format!(
            "https://thumbnails.example.org/{}.png",
            request.id
        )))
    }
}

fn mmd(identifier: &str, parent: Option<&str>) -> String {
    let related = parent
        .map(|p| {
            format!(
                "<mmd:related_dataset relation_type=\"parent\">{}</mmd:related_dataset>",
                p
            )
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<mmd:mmd xmlns:mmd="http://www.met.no/schema/mmd">
  <mmd:metadata_identifier>{identifier}</mmd:metadata_identifier>
  <mmd:title xml:lang="en">Dataset {identifier}</mmd:title>
  <mmd:abstract xml:lang="en">Test dataset.</mmd:abstract>
  <mmd:metadata_status>Active</mmd:metadata_status>
  <mmd:temporal_extent>
    <mmd:start_date>2022-01-01T00:00:00Z</mmd:start_date>
  </mmd:temporal_extent>
  <mmd:data_access>
    <mmd:type>OGC WMS</mmd:type>
    <mmd:resource>https://wms.example.org/{identifier}</mmd:resource>
  </mmd:data_access>
  {related}
</mmd:mmd>"#
    )
}

fn write_records(dir: &Path, count: usize) {
    for i in 0..count {
        fs::write(dir.join(format!("rec{:02}.xml", i)), mmd(&format!("test:rec{:02}", i), None))
            .unwrap();
    }
}

fn coordinator(
    index: Arc<MockIndex>,
    builder: DocumentBuilder,
    config: PoolConfig,
) -> RunCoordinator {
    RunCoordinator::new(
        Arc::new(SearchIndexService::new(index)),
        Arc::new(builder),
        config,
    )
}

fn plain_builder() -> DocumentBuilder {
    DocumentBuilder::new(BuildOptions::default(), None, None)
}

fn pool(workers: usize, threads: usize, batch_size: usize) -> PoolConfig {
    PoolConfig {
        workers,
        threads,
        batch_size,
        ..PoolConfig::default()
    }
}

#[tokio::test]
async fn test_batches_of_two_over_five_records() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 5);
    let index = Arc::new(MockIndex::default());

    let report = coordinator(index.clone(), plain_builder(), pool(1, 1, 2))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    assert_eq!(index.batch_sizes().await, vec![2, 2, 1]);
    assert_eq!(report.summary.seen, 5);
    assert_eq!(report.summary.succeeded, 5);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.state, RunState::Completed);
    assert!(report.summary.is_consistent());
}

#[tokio::test]
async fn test_batches_never_exceed_batch_size_with_many_units() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 11);
    let index = Arc::new(MockIndex::default());

    let report = coordinator(index.clone(), plain_builder(), pool(2, 2, 3))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    let sizes = index.batch_sizes().await;
    assert!(sizes.iter().all(|&size| size <= 3), "sizes: {:?}", sizes);
    assert_eq!(sizes.iter().sum::<usize>(), 11);
    assert_eq!(report.summary.succeeded, 11);
}

#[tokio::test]
async fn test_one_unparseable_record() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 4);
    fs::write(dir.path().join("broken.xml"), "<mmd:mmd><mmd:title>oops").unwrap();
    let index = Arc::new(MockIndex::default());

    let report = coordinator(index.clone(), plain_builder(), pool(2, 2, 10))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    assert_eq!(report.summary.seen, 5);
    assert_eq!(report.summary.succeeded, 4);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.failures[0].kind, "build");
    assert!(report.summary.failures[0].record.ends_with("broken.xml"));
    assert_eq!(report.state, RunState::CompletedWithErrors);
    assert_eq!(index.stored_ids().await.len(), 4);
}

#[tokio::test]
async fn test_thumbnail_timeout_degrades_one_record() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 3);
    let index = Arc::new(MockIndex::default());
    let options = BuildOptions {
        network_timeout: Duration::from_millis(200),
        ..BuildOptions::default()
    };
    let builder = DocumentBuilder::new(
        options,
        Some(Arc::new(MockThumbnailService {
            hang_for: "test-rec01".to_string(),
        })),
        None,
    );

    let report = coordinator(index.clone(), builder, pool(1, 3, 10))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    assert_eq!(report.summary.succeeded, 3);
    let stored = index.stored.lock().await;
    assert!(!stored["test-rec01"].contains("thumbnail_url"));
    assert_eq!(
        stored["test-rec00"].get_str("thumbnail_url"),
        Some("https://thumbnails.example.org/test-rec00.png")
    );
    assert!(stored["test-rec02"].contains("thumbnail_url"));
}

#[tokio::test]
async fn test_mark_parent_issues_single_update() {
    let index = Arc::new(MockIndex::default());
    let mut parent = SolrDocument::new("no-met-parent", "no.met:parent");
    parent.set("bbox_rpt", "ENVELOPE(0,1,1,0)");
    index
        .stored
        .lock()
        .await
        .insert("no-met-parent".to_string(), parent);

    let coordinator = coordinator(index.clone(), plain_builder(), pool(1, 1, 10));
    let outcome = coordinator.mark_parent("no.met:parent").await.unwrap();

    assert_eq!(outcome, ParentMarkOutcome::Marked);
    assert_eq!(*index.updates.lock().await, vec!["no-met-parent".to_string()]);
    assert!(index.batches.lock().await.is_empty());
    let stored = index.stored.lock().await;
    assert!(stored["no-met-parent"].is_parent());
    assert!(!stored["no-met-parent"].contains("bbox_rpt"));
}

#[tokio::test]
async fn test_children_mark_their_parents() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("parent.xml"), mmd("test:parent", None)).unwrap();
    fs::write(dir.path().join("child1.xml"), mmd("test:child1", Some("test:parent"))).unwrap();
    fs::write(dir.path().join("child2.xml"), mmd("test:child2", Some("test:parent"))).unwrap();
    fs::write(dir.path().join("orphan.xml"), mmd("test:orphan", Some("test:gone"))).unwrap();
    let index = Arc::new(MockIndex::default());

    let report = coordinator(index.clone(), plain_builder(), pool(1, 2, 10))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    assert_eq!(report.summary.parents_marked, vec!["test-parent".to_string()]);
    assert_eq!(report.summary.missing_parents, vec!["test-gone".to_string()]);
    assert_eq!(index.updates.lock().await.len(), 1);
    let stored = index.stored.lock().await;
    assert!(stored["test-parent"].is_parent());
    assert_eq!(stored["test-child1"].get_str("related_dataset_id"), Some("test-parent"));
    assert_eq!(report.state, RunState::Completed);
}

#[tokio::test]
async fn test_every_record_indexed_once_for_any_pool_size() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 12);
    let mut previous: Option<HashSet<String>> = None;

    for (workers, threads) in [(1, 1), (2, 3), (4, 4)] {
        let index = Arc::new(MockIndex::default());
        let report = coordinator(index.clone(), plain_builder(), pool(workers, threads, 2))
            .run(&RecordSource::directory(dir.path(), false))
            .await
            .unwrap();

        assert_eq!(report.summary.seen, 12);
        let submitted: Vec<String> = index.batches.lock().await.concat();
        assert_eq!(submitted.len(), 12, "a record was submitted twice");
        let ids = index.stored_ids().await;
        assert_eq!(ids.len(), 12);
        if let Some(previous) = &previous {
            assert_eq!(previous, &ids);
        }
        previous = Some(ids);
    }
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 6);
    let index = Arc::new(MockIndex::default());
    let source = RecordSource::directory(dir.path(), false);

    coordinator(index.clone(), plain_builder(), pool(2, 2, 4))
        .run(&source)
        .await
        .unwrap();
    let first = index.stored_ids().await;
    coordinator(index.clone(), plain_builder(), pool(1, 1, 4))
        .run(&source)
        .await
        .unwrap();

    assert_eq!(first, index.stored_ids().await);
    assert_eq!(first.len(), 6);
}

#[tokio::test]
async fn test_commit_policy() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 4);

    let index = Arc::new(MockIndex::default());
    let config = PoolConfig {
        commit_at_end: true,
        ..pool(1, 1, 2)
    };
    coordinator(index.clone(), plain_builder(), config)
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();
    assert_eq!(*index.commits.lock().await, 1);

    let index = Arc::new(MockIndex::default());
    let config = PoolConfig {
        always_commit: true,
        commit_at_end: true,
        ..pool(1, 1, 2)
    };
    coordinator(index.clone(), plain_builder(), config)
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();
    assert_eq!(*index.commits.lock().await, 2);

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("parent.xml"), mmd("test:parent", None)).unwrap();
    fs::write(dir.path().join("child.xml"), mmd("test:child", Some("test:parent"))).unwrap();
    let index = Arc::new(MockIndex::default());
    let config = PoolConfig {
        always_commit: true,
        ..pool(1, 1, 10)
    };
    let report = coordinator(index.clone(), plain_builder(), config)
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();
    assert_eq!(report.summary.parents_marked, vec!["test-parent".to_string()]);
    assert_eq!(
        *index.calls.lock().await,
        vec!["add", "commit", "update", "commit"]
    );
}

#[tokio::test]
async fn test_unreachable_index_mid_run_fails_batches() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 6);
    let index = Arc::new(MockIndex {
        reachable_batches: Some(1),
        ..MockIndex::default()
    });

    let report = coordinator(index.clone(), plain_builder(), pool(1, 1, 2))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    assert_eq!(report.summary.seen, 6);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 4);
    assert!(report.summary.failures.iter().all(|f| f.kind == "submit"));
    assert!(report.summary.is_consistent());
    assert_eq!(report.state, RunState::CompletedWithErrors);
    assert_eq!(index.stored_ids().await.len(), 2);
}

#[tokio::test]
async fn test_crashed_unit_fails_its_claimed_records() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 3);
    let index = Arc::new(MockIndex {
        panic_on_add: true,
        ..MockIndex::default()
    });

    let report = coordinator(index.clone(), plain_builder(), pool(1, 1, 2))
        .run(&RecordSource::directory(dir.path(), false))
        .await
        .unwrap();

    assert_eq!(report.summary.seen, 2);
    assert_eq!(report.summary.failed, 2);
    assert!(report.summary.failures.iter().all(|f| f.kind == "aborted"));
    assert!(report.summary.is_consistent());
    assert_eq!(report.state, RunState::CompletedWithErrors);
}

#[tokio::test]
async fn test_shutdown_drains_and_reports_interrupted() {
    let dir = TempDir::new().unwrap();
    write_records(dir.path(), 10);
    let index = Arc::new(MockIndex::default());
    let options = BuildOptions {
        network_timeout: Duration::from_secs(5),
        ..BuildOptions::default()
    };
    let builder = DocumentBuilder::new(
        options,
        Some(Arc::new(SlowThumbnailService {
            delay: Duration::from_millis(200),
        })),
        None,
    );
    let coordinator = coordinator(index.clone(), builder, pool(1, 1, 10));
    let source = RecordSource::directory(dir.path(), false);

    let (report, _) = tokio::join!(coordinator.run(&source), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        coordinator.shutdown();
    });
    let report = report.unwrap();

    assert!(report.interrupted);
    assert!(report.summary.seen >= 1 && report.summary.seen < 10);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.succeeded, report.summary.seen);
    assert_eq!(index.stored_ids().await.len() as u64, report.summary.seen);
    assert_eq!(report.state, RunState::CompletedWithErrors);
    assert!(!report.is_success(&ExitPolicy::default()));
}

#[tokio::test]
async fn test_source_errors_are_fatal() {
    let dir = TempDir::new().unwrap();
    let index = Arc::new(MockIndex::default());
    let coordinator = coordinator(index.clone(), plain_builder(), pool(1, 1, 2));

    let missing = coordinator
        .run(&RecordSource::directory(dir.path().join("nope"), false))
        .await;
    assert!(matches!(missing, Err(IngestError::SourceNotFound(_))));

    let empty = coordinator
        .run(&RecordSource::directory(dir.path(), false))
        .await;
    assert!(matches!(empty, Err(IngestError::EmptyInput(_))));
    assert!(index.batches.lock().await.is_empty());
}
