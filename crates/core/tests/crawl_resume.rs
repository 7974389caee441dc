//! Crawl-then-download integration tests.
//!
//! A run is interrupted part way through; the next run reuses the cached
//! catalog and only works on what is left.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reelsync_core::{
    config::CrawlConfig,
    testing::{fixtures, MockFetcher, MockProbe, MockRenderer},
    CatalogCache, CatalogItem, ConnectivityGate, CrawlCoordinator, DetailScan,
    DownloadOrchestrator, DownloadStatus, JsonCatalogCache, JsonStatusStore, MediaFetcher,
    OrchestratorConfig, PageRenderer, ReachabilityProbe, RendererError, RunOptions, StatusStore,
};

struct Workspace {
    renderer: Arc<MockRenderer>,
    fetcher: Arc<MockFetcher>,
    cache: Arc<JsonCatalogCache>,
    store: Arc<JsonStatusStore>,
    temp_dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            renderer: Arc::new(MockRenderer::new()),
            fetcher: Arc::new(MockFetcher::new()),
            cache: Arc::new(JsonCatalogCache::new(temp_dir.path().join("catalog.json"))),
            store: Arc::new(JsonStatusStore::new(temp_dir.path().join("db.json"))),
            temp_dir,
        }
    }

    fn crawler(&self) -> CrawlCoordinator {
        CrawlCoordinator::new(
            Arc::clone(&self.renderer) as Arc<dyn PageRenderer>,
            Arc::clone(&self.cache) as Arc<dyn CatalogCache>,
            CrawlConfig::default(),
        )
    }

    fn orchestrator(&self) -> DownloadOrchestrator {
        let gate = ConnectivityGate::new(
            Arc::new(MockProbe::reachable()) as Arc<dyn ReachabilityProbe>,
            Duration::from_millis(1),
        );
        DownloadOrchestrator::new(
            OrchestratorConfig::new(self.temp_dir.path().join("downloads")),
            Arc::clone(&self.store) as Arc<dyn StatusStore>,
            Arc::clone(&self.renderer) as Arc<dyn PageRenderer>,
            self.renderer.session(),
            gate,
            Arc::clone(&self.fetcher) as Arc<dyn MediaFetcher>,
        )
    }

    async fn serve_direct(&self, item: &CatalogItem, n: u32) {
        let link = format!("https://cdn.test/files/{}.mp4", n);
        self.renderer
            .set_detail(
                &item.url,
                DetailScan::Media(fixtures::media_descriptor(
                    &format!("Clip {}", n),
                    &[("1280x720.mp4", link.as_str())],
                    None,
                )),
            )
            .await;
        self.fetcher.set_file(&link, vec![n as u8; 300]).await;
    }

    fn status_of(&self, item: &CatalogItem) -> Option<DownloadStatus> {
        self.store.get(&item.url).unwrap().map(|r| r.status)
    }
}

#[tokio::test]
async fn test_interrupted_run_resumes_from_cached_catalog() {
    let ws = Workspace::new();
    let newest_first: Vec<CatalogItem> = (1..=4).rev().map(fixtures::catalog_item).collect();
    ws.renderer
        .set_pages(vec![newest_first[..2].to_vec(), newest_first[2..].to_vec()])
        .await;
    for n in 1..=4 {
        ws.serve_direct(&fixtures::catalog_item(n), n).await;
    }
    // The bridge dies while item 3 is being scanned.
    ws.renderer
        .fail_detail(
            &fixtures::catalog_item(3).url,
            RendererError::Unavailable("renderer exited".to_string()),
        )
        .await;

    let items = ws.crawler().load(false).await.unwrap();
    let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Item 1", "Item 2", "Item 3", "Item 4"]);
    assert_eq!(ws.renderer.scanned_pages().await, vec![1, 2, 3]);

    let err = ws
        .orchestrator()
        .run(&items, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        reelsync_core::OrchestratorError::Renderer(RendererError::Unavailable(_))
    ));
    assert_eq!(ws.status_of(&items[0]), Some(DownloadStatus::Done));
    assert_eq!(ws.status_of(&items[1]), Some(DownloadStatus::Done));
    assert_eq!(ws.status_of(&items[2]), None);
    assert_eq!(ws.status_of(&items[3]), None);

    // Next run: catalog comes from the snapshot, finished items are skipped.
    let items = ws.crawler().load(false).await.unwrap();
    assert_eq!(ws.renderer.scanned_pages().await, vec![1, 2, 3]);

    let summary = ws
        .orchestrator()
        .run(&items, &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.done, 2);
    for item in &items {
        assert_eq!(ws.status_of(item), Some(DownloadStatus::Done));
    }
    assert!(ws.store.pending_review().unwrap().is_empty());

    let downloads = ws.temp_dir.path().join("downloads");
    assert_eq!(
        std::fs::read(downloads.join("Anna - Clip 3.mp4")).unwrap(),
        vec![3u8; 300]
    );
}

#[tokio::test]
async fn test_status_file_survives_new_store_instance() {
    let ws = Workspace::new();
    let item = fixtures::catalog_item(7);
    ws.serve_direct(&item, 7).await;

    ws.orchestrator()
        .run(&[item.clone()], &RunOptions::default())
        .await
        .unwrap();

    let reopened = JsonStatusStore::new(ws.store.path());
    let record = reopened.get(&item.url).unwrap().unwrap();
    assert_eq!(record.status, DownloadStatus::Done);
    assert_eq!(record.filename, "Anna - Clip 7");
    assert_eq!(record.name, "Item 7");
}
