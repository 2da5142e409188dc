use async_trait::async_trait;
use doclib_core::{DocLibConfig, Error, Result};
use doclib_service::{DocService, ExtractedMetadata, MetadataExtractor};
use doclib_watcher::{route, spawn_consumer, ChangeKind, Debouncer, EntryKind, RawChange};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn library(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (path, body) in files {
        let full = temp.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, body).unwrap();
    }
    temp
}

fn config(root: &Path) -> DocLibConfig {
    let mut config = DocLibConfig::with_root(root);
    config.watch = false;
    config
}

fn set_modified(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[tokio::test]
async fn test_content_is_cached() {
    let temp = library(&[("guide.md", "# Guide")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let first = service.get_content("guide.md").await.unwrap();
    let second = service.get_content("/guide.md").await.unwrap();

    assert_eq!(first.content, "# Guide");
    assert_eq!(first.path, "guide.md");
    assert_eq!(first.size, 7);
    assert!(Arc::ptr_eq(&first, &second));

    let stats = service.stats();
    assert_eq!(stats.file_reads, 1);
    assert_eq!(stats.cache("content").unwrap().hits, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_hit_disk_once() {
    let temp = library(&[("x.md", "shared body")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let (a, b) = tokio::join!(service.get_content("x.md"), service.get_content("x.md"));
    assert_eq!(a.unwrap().content, "shared body");
    assert_eq!(b.unwrap().content, "shared body");
    assert_eq!(service.stats().file_reads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_readers_share_one_read() {
    let temp = library(&[("x.md", "body")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_content("x.md").await })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        assert_eq!(result.unwrap().unwrap().content, "body");
    }
    assert_eq!(service.stats().file_reads, 1);
}

#[tokio::test]
async fn test_changed_file_is_reread() {
    let temp = library(&[("a.md", "old")]);
    let service = DocService::new(config(temp.path())).unwrap();
    assert_eq!(service.get_content("a.md").await.unwrap().content, "old");

    let file = temp.path().join("a.md");
    fs::write(&file, "new").unwrap();
    set_modified(&file, SystemTime::now() + Duration::from_secs(60));

    assert_eq!(service.get_content("a.md").await.unwrap().content, "new");
    let stats = service.stats();
    assert_eq!(stats.file_reads, 2);

    // The outdated entry counts as a miss, not a hit
    let content = stats.cache("content").unwrap();
    assert_eq!((content.hits, content.misses), (0, 2));
}

#[tokio::test]
async fn test_missing_and_invalid_paths() {
    let temp = library(&[("docs/a.md", "a")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let err = service.get_content("missing.md").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(service.stats().cache("content").unwrap().size, 0);

    assert!(matches!(
        service.get_content("../etc/passwd").await,
        Err(Error::InvalidPath { .. })
    ));
    assert!(matches!(
        service.get_content("docs").await,
        Err(Error::InvalidPath { .. })
    ));
}

#[tokio::test]
async fn test_invalidate_path_removes_only_that_entry() {
    let temp = library(&[("a.md", "a"), ("b.md", "b")]);
    let service = DocService::new(config(temp.path())).unwrap();
    service.get_content("a.md").await.unwrap();
    service.get_content("b.md").await.unwrap();

    let before = service.version();
    let after = service.invalidate_path("a.md").unwrap();
    assert!(after > before);
    assert_eq!(service.stats().cache("content").unwrap().size, 1);

    service.get_content("b.md").await.unwrap();
    assert_eq!(service.stats().file_reads, 2);
    service.get_content("a.md").await.unwrap();
    assert_eq!(service.stats().file_reads, 3);
}

#[tokio::test]
async fn test_invalidate_directory_removes_descendants() {
    let temp = library(&[("guides/a.md", "a"), ("guides/deep/b.md", "b"), ("top.md", "t")]);
    let service = DocService::new(config(temp.path())).unwrap();
    for path in ["guides/a.md", "guides/deep/b.md", "top.md"] {
        service.get_content(path).await.unwrap();
    }
    service.get_tree().await;

    service.invalidate_path("guides").unwrap();

    let stats = service.stats();
    assert_eq!(stats.cache("content").unwrap().size, 1);
    assert_eq!(stats.cache("tree").unwrap().size, 0);
}

#[tokio::test]
async fn test_tree_ordering_and_caching() {
    let temp = library(&[("2_b.md", ""), ("1_a.md", ""), ("readme.md", ""), ("1_dir/x.md", "")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let tree = service.get_tree().await;
    assert_eq!(tree.root.child_names(), vec!["1_dir", "1_a.md", "2_b.md", "readme.md"]);
    assert!(tree.root.children[0].is_unexpanded());
    assert!(!tree.stale);
    assert!(tree.error.is_none());

    let again = service.get_tree().await;
    assert!(Arc::ptr_eq(&tree, &again));
}

#[tokio::test]
async fn test_tree_rebuilt_after_version_bump() {
    let temp = library(&[("a.md", "")]);
    let service = DocService::new(config(temp.path())).unwrap();
    let tree = service.get_tree().await;
    assert_eq!(tree.root.child_names(), vec!["a.md"]);

    fs::write(temp.path().join("b.md"), "").unwrap();
    service.invalidate_path("b.md").unwrap();

    let rebuilt = service.get_tree().await;
    assert_eq!(rebuilt.root.child_names(), vec!["a.md", "b.md"]);
    assert!(rebuilt.version > tree.version);
}

#[tokio::test]
async fn test_failed_rebuild_serves_stale_tree() {
    let temp = library(&[("a.md", "")]);
    let service = DocService::new(config(temp.path())).unwrap();
    let good = service.get_tree().await;

    fs::remove_dir_all(temp.path()).unwrap();
    service.invalidate_all();

    let fallback = service.get_tree().await;
    assert!(fallback.stale);
    assert_eq!(fallback.root, good.root);
}

#[tokio::test]
async fn test_missing_root_yields_explicit_error_tree() {
    let temp = TempDir::new().unwrap();
    let service = DocService::new(config(&temp.path().join("absent"))).unwrap();

    let tree = service.get_tree().await;
    assert!(tree.error.is_some());
    assert!(tree.root.children.is_empty());
    assert!(!tree.stale);
}

#[tokio::test]
async fn test_subtree_requests() {
    let temp = library(&[("guides/1_intro.md", ""), ("guides/more/x.md", "")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let full = service.get_subtree("guides").await.unwrap();
    assert_eq!(full.root.child_names(), vec!["more", "1_intro.md"]);
    assert_eq!(full.root.children[0].child_names(), vec!["x.md"]);

    let lazy = service.get_subtree_with_depth("guides", 0).await.unwrap();
    assert!(lazy.root.is_unexpanded());

    assert!(service.get_subtree("nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_breadcrumb() {
    let temp = library(&[]);
    let service = DocService::new(config(temp.path())).unwrap();

    let crumbs = service.get_breadcrumb("guides/setup/1_install.md").await.unwrap();
    let paths: Vec<&str> = crumbs.iter().map(|c| c.path.as_str()).collect();
    let names: Vec<&str> = crumbs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(paths, vec!["guides", "guides/setup", "guides/setup/1_install.md"]);
    assert_eq!(names, vec!["guides", "setup", "1_install.md"]);

    service.get_breadcrumb("guides/setup/1_install.md").await.unwrap();
    assert_eq!(service.stats().cache("breadcrumb").unwrap().hits, 1);
}

#[tokio::test]
async fn test_recent_documents() {
    let temp = library(&[
        ("old.md", ""),
        ("guides/new.md", ""),
        ("middle.md", ""),
        ("image.png", ""),
        (".drafts/secret.md", ""),
    ]);
    let now = SystemTime::now();
    set_modified(&temp.path().join("old.md"), now - Duration::from_secs(300));
    set_modified(&temp.path().join("middle.md"), now - Duration::from_secs(200));
    set_modified(&temp.path().join("guides/new.md"), now - Duration::from_secs(100));

    let service = DocService::new(config(temp.path())).unwrap();
    let recent = service.get_recent_docs(10).await.unwrap();
    let paths: Vec<&str> = recent.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(paths, vec!["guides/new.md", "middle.md", "old.md"]);
    assert_eq!(recent[0].name, "new.md");

    let limited = service.get_recent_docs(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(service.stats().cache("recent").unwrap().hits, 1);
}

#[tokio::test]
async fn test_get_file_reports_mime_type() {
    let temp = library(&[("images/logo.png", "png"), ("notes.bin", "?")]);
    let service = DocService::new(config(temp.path())).unwrap();

    let file = service.get_file("images/logo.png").await.unwrap();
    assert_eq!(file.mime_type, "image/png");
    assert!(file.absolute_path.ends_with("images/logo.png"));

    let unknown = service.get_file("notes.bin").await.unwrap();
    assert_eq!(unknown.mime_type, "application/octet-stream");

    assert!(service.get_file("missing.pdf").await.unwrap_err().is_not_found());
}

struct CountingExtractor {
    calls: AtomicUsize,
    behavior: Behavior,
}

enum Behavior {
    Pages(u32),
    Fail,
    Hang,
}

impl CountingExtractor {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior,
        })
    }
}

#[async_trait]
impl MetadataExtractor for CountingExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        match self.behavior {
            Behavior::Pages(pages) => Ok(ExtractedMetadata {
                page_count: Some(pages),
            }),
            Behavior::Fail => Err(Error::extraction(path.display().to_string(), "corrupt file")),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ExtractedMetadata::default())
            }
        }
    }
}

#[tokio::test]
async fn test_metadata_is_extracted_once() {
    let temp = library(&[("manual.pdf", "%PDF")]);
    let extractor = CountingExtractor::new(Behavior::Pages(12));
    let service = DocService::with_extractor(config(temp.path()), extractor.clone()).unwrap();

    let (a, b) = tokio::join!(
        service.get_metadata("manual.pdf"),
        service.get_metadata("manual.pdf")
    );
    assert_eq!(a.unwrap().page_count, Some(12));
    assert_eq!(b.unwrap().page_count, Some(12));

    let cached = service.get_metadata("manual.pdf").await.unwrap();
    assert_eq!(cached.size, 4);
    assert!(!cached.degraded);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_metadata_failure_degrades() {
    let temp = library(&[("broken.pdf", "junk")]);
    let extractor = CountingExtractor::new(Behavior::Fail);
    let service = DocService::with_extractor(config(temp.path()), extractor.clone()).unwrap();

    let (a, b) = tokio::join!(
        service.get_metadata("broken.pdf"),
        service.get_metadata("broken.pdf")
    );
    assert!(matches!(a, Err(Error::Extraction { .. })));
    assert!(matches!(b, Err(Error::Extraction { .. })));

    let degraded = service.get_metadata("broken.pdf").await.unwrap();
    assert!(degraded.degraded);
    assert_eq!(degraded.page_count, None);
    assert_eq!(degraded.size, 4);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_metadata_timeout() {
    let temp = library(&[("slow.pdf", "x")]);
    let extractor = CountingExtractor::new(Behavior::Hang);
    let mut config = config(temp.path());
    config.metadata_timeout = Duration::from_millis(100);
    let service = DocService::with_extractor(config, extractor).unwrap();

    let err = service.get_metadata("slow.pdf").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(service.get_metadata("slow.pdf").await.unwrap().degraded);
}

#[tokio::test]
async fn test_five_watcher_events_bump_version_once() {
    let temp = library(&[("a.md", "a")]);
    let service = DocService::new(config(temp.path())).unwrap();
    service.get_content("a.md").await.unwrap();
    let before = service.version();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let consumer = spawn_consumer(
        service.root().to_path_buf(),
        rx,
        Debouncer::new(Duration::from_millis(50)),
        service.invalidation_sink(),
    );
    for _ in 0..5 {
        tx.send(RawChange::new(
            service.root().join("a.md"),
            ChangeKind::Modify,
            EntryKind::File,
        ))
        .unwrap();
    }
    drop(tx);
    consumer.await.unwrap();

    assert_eq!(service.version(), before + 1);
    assert_eq!(service.stats().cache("content").unwrap().size, 0);
}

#[tokio::test]
async fn test_renamed_directory_drops_descendant_entries() {
    let temp = library(&[("guides/a.md", "a"), ("other.md", "o")]);
    let service = DocService::new(config(temp.path())).unwrap();

    service.get_metadata("guides/a.md").await.unwrap();
    service.get_content("guides/a.md").await.unwrap();
    service.get_metadata("other.md").await.unwrap();

    let root = service.root().to_path_buf();
    fs::rename(root.join("guides"), root.join("moved")).unwrap();
    let batch = route(
        &root,
        &[
            RawChange::new(root.join("guides"), ChangeKind::Rename, EntryKind::Unknown),
            RawChange::new(root.join("moved"), ChangeKind::Rename, EntryKind::Unknown),
        ],
    );
    service.apply_batch(&batch);

    let err = service.get_metadata("guides/a.md").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(service.get_content("guides/a.md").await.unwrap_err().is_not_found());
    assert_eq!(service.get_metadata("moved/a.md").await.unwrap().path, "moved/a.md");

    // Unrelated entries survive
    assert_eq!(service.stats().cache("metadata").unwrap().size, 2);
}

#[tokio::test]
async fn test_reset_caches_forgets_hot_documents() {
    let temp = library(&[("hot.md", "h")]);
    let mut config = config(temp.path());
    config.hot_document_threshold = 2;
    let service = DocService::new(config).unwrap();

    service.get_content("hot.md").await.unwrap();
    service.get_content("hot.md").await.unwrap();
    assert_eq!(service.stats().hot_documents, 1);

    service.reset_caches();
    let stats = service.stats();
    assert_eq!(stats.hot_documents, 0);
    assert_eq!(stats.cache("content").unwrap().size, 0);
}
