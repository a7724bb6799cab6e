//! Seeding pipeline tests against the fixture configuration, with an
//! in-process fetcher standing in for the upstream server.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use test_utils::ConfigFixture;
use tile_server::{
    AppState, Catalog, RateLimiter, SeedMetrics, SeedingBoundingBox, SeedingMode, SeedingRequest,
    SeedingTask, TaskRegistry, TileDownloader, TileFetcher, TileSummary,
};
use tile_store::ServerOptions;
use wmts_common::{WmtsError, WmtsResult};

/// Writes a small body for every URL except the ones listed in `failing`.
#[derive(Default)]
struct FakeFetcher {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn failing(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            failing: urls.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> WmtsResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(url) {
            return Err(WmtsError::Transport(format!("GET {} returned 500", url)));
        }
        tokio::fs::write(destination, b"tile").await?;
        Ok(4)
    }
}

fn app_state(fixture: &ConfigFixture, fetcher: Arc<FakeFetcher>) -> AppState {
    let options = ServerOptions::load(fixture.config_path()).unwrap();
    let catalog = Catalog::load(options).unwrap();
    AppState::new(
        Arc::new(catalog),
        fetcher,
        Arc::new(RateLimiter::new(Duration::ZERO)),
        None,
    )
}

fn request(start_zoom: usize, end_zoom: usize) -> SeedingRequest {
    SeedingRequest {
        layer_definition: "osm".to_string(),
        cache_identifier: "osm-3857".to_string(),
        map_source: "osm-wmts".to_string(),
        seeding_mode: SeedingMode::Overwrite,
        bbox: None,
        start_zoom: Some(start_zoom),
        end_zoom: Some(end_zoom),
    }
}

fn tile_file(fixture: &ConfigFixture, zoom: usize, col: u32, row: u32) -> PathBuf {
    fixture
        .cache_root()
        .join(format!("osm/default/WebMercatorQuad/{}/{}-{}.png", zoom, col, row))
}

// ============================================================================
// Planning
// ============================================================================

#[tokio::test]
async fn test_three_level_pyramid_has_21_tiles() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    assert_eq!(state.seeding.tile_count(&request(0, 2)).await.unwrap(), 21);

    let task = state.seeding.create_task(&request(0, 2)).await.unwrap();
    assert_eq!(task.tile_count(), 21);
    assert_eq!(task.remaining_tiles(), 21);
    assert_eq!(
        task.tiles()[0].url,
        "http://upstream.test/wmts/WebMercatorQuad/0/0/0.png"
    );
    assert_eq!(task.tiles()[0].path, tile_file(&fixture, 0, 0, 0));

    let zooms: Vec<usize> = task.tiles().iter().map(|t| t.zoom).collect();
    assert!(zooms.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_zoom_defaults_cover_the_whole_set() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    let mut req = request(0, 0);
    req.start_zoom = None;
    req.end_zoom = None;
    assert_eq!(state.seeding.tile_count(&req).await.unwrap(), 1 + 4 + 16 + 64);
}

#[tokio::test]
async fn test_bbox_restricts_the_plan() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    let mut req = request(1, 1);
    req.bbox = Some(SeedingBoundingBox {
        crs: None,
        lower_corner: [10.0, 10.0],
        upper_corner: [170.0, 80.0],
    });
    assert_eq!(state.seeding.tile_count(&req).await.unwrap(), 1);

    let task = state.seeding.create_task(&req).await.unwrap();
    let tile = &task.tiles()[0];
    assert_eq!((tile.col, tile.row, tile.zoom), (1, 0, 1));

    // describe ignores the request area
    assert_eq!(state.seeding.describe(&req).await.unwrap(), 4);
}

#[tokio::test]
async fn test_wms_source_builds_getmap_urls() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    let mut req = request(0, 0);
    req.map_source = "osm-wms".to_string();
    let task = state.seeding.create_task(&req).await.unwrap();

    let url = &task.tiles()[0].url;
    assert!(url.starts_with("http://upstream.test/wms?"));
    assert!(url.contains("request=GetMap"));
    assert!(url.contains("layers=OSM-WMS"));
}

#[tokio::test]
async fn test_unresolvable_requests_are_rejected() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    let mut req = request(0, 1);
    req.layer_definition = "nope".to_string();
    assert!(matches!(
        state.seeding.create_task(&req).await,
        Err(WmtsError::NotFound { kind: "Layer", .. })
    ));

    let mut req = request(0, 1);
    req.cache_identifier = "nope".to_string();
    assert!(matches!(
        state.seeding.create_task(&req).await,
        Err(WmtsError::NotFound { kind: "Cache", .. })
    ));

    let mut req = request(0, 1);
    req.map_source = "nope".to_string();
    assert!(matches!(
        state.seeding.create_task(&req).await,
        Err(WmtsError::NotFound { .. })
    ));

    assert!(matches!(
        state.seeding.create_task(&request(0, 9)).await,
        Err(WmtsError::OutOfRange(_))
    ));

    let mut req = request(0, 0);
    req.map_source = "bing".to_string();
    assert!(matches!(
        state.seeding.create_task(&req).await,
        Err(WmtsError::NotImplemented(_))
    ));

    assert!(state.seeding.task_summaries().await.is_empty());
}

// ============================================================================
// Processing
// ============================================================================

#[tokio::test]
async fn test_seeding_writes_every_tile_and_reaps_the_task() {
    let fixture = ConfigFixture::new();
    let fetcher = Arc::new(FakeFetcher::default());
    let state = app_state(&fixture, fetcher.clone());

    let task = state.seeding.create_task(&request(0, 2)).await.unwrap();
    assert!(state.seeding.get_task(task.id()).await.is_some());

    state.seeding.process_task(task.clone()).await;

    assert_eq!(fetcher.calls(), 21);
    assert_eq!(task.tiles_downloaded(), 21);
    assert_eq!(task.tiles_in_error(), 0);
    assert_eq!(task.progress(), 100.0);
    assert!(state.seeding.get_task(task.id()).await.is_none());
    assert!(tile_file(&fixture, 2, 3, 3).is_file());
    assert_eq!(state.metrics.tiles_downloaded(), 21);
    assert_eq!(state.metrics.tasks_created(), 1);
}

#[tokio::test]
async fn test_one_failed_tile_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let tiles: Vec<TileSummary> = (0..10)
        .map(|i| TileSummary {
            url: format!("http://upstream.test/tiles/{}", i),
            path: dir.path().join(format!("0/{}-0.png", i)),
            col: i,
            row: 0,
            zoom: 0,
        })
        .collect();

    let fetcher = Arc::new(FakeFetcher::failing(["http://upstream.test/tiles/6".to_string()]));
    let registry = Arc::new(TaskRegistry::new());
    let metrics = Arc::new(SeedMetrics::new());
    let downloader = TileDownloader::new(
        fetcher.clone(),
        Arc::new(RateLimiter::new(Duration::ZERO)),
        registry.clone(),
        metrics.clone(),
    );

    let task = Arc::new(SeedingTask::new(1, "osm", "osm-3857", tiles));
    registry.insert(task.clone()).await;
    downloader.process_task(task.clone()).await;

    assert_eq!(task.tiles_downloaded(), 9);
    assert_eq!(task.tiles_in_error(), 1);
    assert_eq!(task.remaining_tiles(), 0);
    assert_eq!(task.progress(), 100.0);
    assert!(registry.is_empty().await);
    assert_eq!(metrics.tiles_failed(), 1);
    assert!(!dir.path().join("0/6-0.png").exists());
    assert!(dir.path().join("0/7-0.png").is_file());
}

#[tokio::test]
async fn test_missing_mode_only_plans_absent_tiles() {
    let fixture = ConfigFixture::new();
    let fetcher = Arc::new(FakeFetcher::default());
    let state = app_state(&fixture, fetcher.clone());

    let first = state.seeding.create_task(&request(0, 1)).await.unwrap();
    state.seeding.process_task(first).await;
    std::fs::remove_file(tile_file(&fixture, 1, 1, 0)).unwrap();

    let mut req = request(0, 1);
    req.seeding_mode = SeedingMode::Missing;
    let retry = state.seeding.create_task(&req).await.unwrap();
    assert_eq!(retry.tile_count(), 1);
    assert_eq!((retry.tiles()[0].col, retry.tiles()[0].row), (1, 0));

    // The count is the plan size, whatever the mode
    assert_eq!(state.seeding.tile_count(&req).await.unwrap(), 5);

    state.seeding.process_task(retry).await;
    assert!(tile_file(&fixture, 1, 1, 0).is_file());
    assert_eq!(fetcher.calls(), 6);
}

#[tokio::test(flavor = "current_thread")]
async fn test_missing_mode_planning_yields_to_other_tasks() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));
    let mut req = request(0, 3);
    req.seeding_mode = SeedingMode::Missing;

    let done = std::sync::atomic::AtomicBool::new(false);
    let ticks = AtomicUsize::new(0);
    let (task, ()) = tokio::join!(
        async {
            let task = state.seeding.create_task(&req).await;
            done.store(true, Ordering::SeqCst);
            task
        },
        async {
            while !done.load(Ordering::SeqCst) {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        }
    );

    assert_eq!(task.unwrap().tile_count(), 85);
    // Existence checks suspend, so the other task ran while tiles were planned.
    assert!(ticks.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_empty_task_is_reaped() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    let first = state.seeding.create_task(&request(0, 0)).await.unwrap();
    state.seeding.process_task(first).await;

    let mut req = request(0, 0);
    req.seeding_mode = SeedingMode::Missing;
    let empty = state.seeding.create_task(&req).await.unwrap();
    assert_eq!(empty.tile_count(), 0);
    assert!(state.seeding.get_task(empty.id()).await.is_some());

    state.seeding.process_task(empty.clone()).await;
    assert!(state.seeding.get_task(empty.id()).await.is_none());
}

#[tokio::test]
async fn test_start_seeding_runs_in_background() {
    let fixture = ConfigFixture::new();
    let fetcher = Arc::new(FakeFetcher::default());
    let state = app_state(&fixture, fetcher.clone());

    let task = state.seeding.start_seeding(&request(0, 1)).await.unwrap();
    for _ in 0..200 {
        if state.seeding.get_task(task.id()).await.is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(state.seeding.get_task(task.id()).await.is_none());
    assert_eq!(task.tiles_downloaded(), 5);
}

// ============================================================================
// Cancellation and cache clearing
// ============================================================================

#[tokio::test]
async fn test_cancelled_task_skips_its_tiles() {
    let fixture = ConfigFixture::new();
    let fetcher = Arc::new(FakeFetcher::default());
    let state = app_state(&fixture, fetcher.clone());

    let task = state.seeding.create_task(&request(0, 1)).await.unwrap();
    state.seeding.cancel_task(task.id()).await.unwrap();
    state.seeding.process_task(task.clone()).await;

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(task.tiles_in_error(), 5);
    assert_eq!(task.remaining_tiles(), 0);
    assert!(state.seeding.get_task(task.id()).await.is_none());

    assert!(matches!(
        state.seeding.cancel_task(task.id()).await,
        Err(WmtsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_clear_layer_cache() {
    let fixture = ConfigFixture::new();
    let state = app_state(&fixture, Arc::new(FakeFetcher::default()));

    let task = state.seeding.create_task(&request(0, 0)).await.unwrap();
    state.seeding.process_task(task).await;
    assert!(fixture.cache_root().join("osm").is_dir());

    state.seeding.clear_layer_cache("osm").await.unwrap();
    assert!(!fixture.cache_root().join("osm").exists());

    // Nothing left to remove
    state.seeding.clear_layer_cache("osm").await.unwrap();
    assert!(fixture.cache_root().is_dir());
}
