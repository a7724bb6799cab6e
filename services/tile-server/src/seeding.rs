//! Seeding service: turns a seeding request into a task and runs it.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wmts_common::{
    BoundingBox, LayerCache, LayerDefinition, MapSource, TileIterationRequest,
    TileMatrixSetLimits, WmtsError, WmtsResult,
};
use wmts_protocol::UrlBuilder;

use crate::download::TileDownloader;
use crate::metrics::SeedMetrics;
use crate::state::Catalog;
use crate::task::{SeedingTask, TaskRegistry, TaskSummary, TileSummary};

/// CRS assumed for a request bounding box that names none.
pub const DEFAULT_BBOX_CRS: &str = "EPSG:4326";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedingMode {
    /// Download every tile
    #[default]
    Overwrite,
    /// Skip tiles already present on disk
    Missing,
}

/// Area to seed, in `crs` (EPSG:4326 when absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedingBoundingBox {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    pub lower_corner: [f64; 2],
    pub upper_corner: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedingRequest {
    pub layer_definition: String,
    pub cache_identifier: String,
    pub map_source: String,
    #[serde(default)]
    pub seeding_mode: SeedingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<SeedingBoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_zoom: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_zoom: Option<usize>,
}

/// A request with every identifier resolved.
struct ResolvedRequest {
    layer: Arc<LayerDefinition>,
    source: Arc<MapSource>,
    start_zoom: usize,
    end_zoom: usize,
    limits: Option<TileMatrixSetLimits>,
}

impl ResolvedRequest {
    fn cache(&self, identifier: &str) -> WmtsResult<&LayerCache> {
        self.layer
            .get_cache(identifier)
            .ok_or_else(|| WmtsError::not_found("Cache", identifier))
    }
}

pub struct SeedingService {
    catalog: Arc<Catalog>,
    registry: Arc<TaskRegistry>,
    downloader: Arc<TileDownloader>,
    metrics: Arc<SeedMetrics>,
    next_task_id: AtomicU64,
}

impl SeedingService {
    pub fn new(
        catalog: Arc<Catalog>,
        registry: Arc<TaskRegistry>,
        downloader: Arc<TileDownloader>,
        metrics: Arc<SeedMetrics>,
    ) -> Self {
        Self {
            catalog,
            registry,
            downloader,
            metrics,
            next_task_id: AtomicU64::new(1),
        }
    }

    async fn resolve(&self, request: &SeedingRequest) -> WmtsResult<ResolvedRequest> {
        let layer = self.catalog.layers.require(&request.layer_definition).await?;
        let source = self.catalog.map_sources.require(&request.map_source)?;
        let cache = layer
            .get_cache(&request.cache_identifier)
            .ok_or_else(|| WmtsError::not_found("Cache", &request.cache_identifier))?;

        let (default_start, default_end) = cache.zoom_range();
        let start_zoom = request.start_zoom.unwrap_or(default_start);
        let end_zoom = request.end_zoom.unwrap_or(default_end);

        let limits = match &request.bbox {
            Some(bbox) => {
                let tms = cache.tile_matrix_set();
                let crs = bbox.crs.as_deref().unwrap_or(DEFAULT_BBOX_CRS);
                let from = self.catalog.srs.require(crs)?;
                let extent = self.catalog.transform.transform_extent(
                    &BoundingBox::from_corners(bbox.lower_corner, bbox.upper_corner),
                    from,
                    tms.spatial_reference(),
                )?;
                Some(tms.limits_for_extent(&extent, Some(start_zoom), Some(end_zoom))?)
            }
            None => None,
        };

        Ok(ResolvedRequest {
            layer,
            source,
            start_zoom,
            end_zoom,
            limits,
        })
    }

    /// Number of tiles the request covers, before any `missing` filtering.
    pub async fn tile_count(&self, request: &SeedingRequest) -> WmtsResult<u64> {
        let resolved = self.resolve(request).await?;
        let cache = resolved.cache(&request.cache_identifier)?;
        let iteration = TileIterationRequest::new(
            &resolved.layer,
            cache,
            resolved.start_zoom,
            resolved.end_zoom,
            resolved.limits.clone(),
        )?;
        Ok(iteration.tile_count())
    }

    /// Tile count from the cache's own limits, ignoring the request bbox.
    pub async fn describe(&self, request: &SeedingRequest) -> WmtsResult<u64> {
        let resolved = self.resolve(request).await?;
        let cache = resolved.cache(&request.cache_identifier)?;
        let tms = cache.tile_matrix_set();
        let (start, end) = (Some(resolved.start_zoom), Some(resolved.end_zoom));

        match cache.tile_matrix_set_limits() {
            Some(limits) => limits.tile_count_for(tms, start, end),
            None => tms.total_tile_count(start, end),
        }
    }

    /// Resolve the request and materialize its tile list into a registered
    /// task. Nothing is downloaded yet.
    pub async fn create_task(&self, request: &SeedingRequest) -> WmtsResult<Arc<SeedingTask>> {
        let resolved = self.resolve(request).await?;
        let cache = resolved.cache(&request.cache_identifier)?;
        let builder = UrlBuilder::for_source(&resolved.source)?;
        let iteration = TileIterationRequest::new(
            &resolved.layer,
            cache,
            resolved.start_zoom,
            resolved.end_zoom,
            resolved.limits.clone(),
        )?;

        let scheme = resolved.layer.file_path_scheme();
        let mut tiles = Vec::new();
        let mut skipped = 0u64;
        for tile in resolved.layer.iterate_tiles(&iteration) {
            let path = self.catalog.paths.tile_path(scheme, &tile)?;
            if request.seeding_mode == SeedingMode::Missing
                && tokio::fs::try_exists(&path).await.unwrap_or(false)
            {
                skipped += 1;
                continue;
            }
            tiles.push(TileSummary {
                url: builder.request_url(&tile)?,
                path,
                col: tile.col,
                row: tile.row,
                zoom: tile.zoom,
            });
        }

        let id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        let task = Arc::new(SeedingTask::new(
            id,
            resolved.layer.identifier(),
            cache.identifier(),
            tiles,
        ));
        self.registry.insert(task.clone()).await;
        self.metrics.record_task_created();

        info!(
            task_id = id,
            layer = %task.layer(),
            cache = %task.cache(),
            tiles = task.tile_count(),
            skipped,
            start_zoom = resolved.start_zoom,
            end_zoom = resolved.end_zoom,
            "Seeding task created"
        );

        Ok(task)
    }

    /// Create a task and run it in the background.
    pub async fn start_seeding(&self, request: &SeedingRequest) -> WmtsResult<Arc<SeedingTask>> {
        let task = self.create_task(request).await?;
        let downloader = self.downloader.clone();
        tokio::spawn({
            let task = task.clone();
            async move { downloader.process_task(task).await }
        });
        Ok(task)
    }

    /// Run a task to completion in the current task.
    pub async fn process_task(&self, task: Arc<SeedingTask>) {
        self.downloader.process_task(task).await
    }

    pub async fn get_task(&self, id: u64) -> Option<Arc<SeedingTask>> {
        self.registry.get(id).await
    }

    pub async fn task_summaries(&self) -> Vec<TaskSummary> {
        self.registry
            .list()
            .await
            .iter()
            .map(|t| t.summary())
            .collect()
    }

    /// Stop dispatching the task's remaining tiles. Fails with NotFound for
    /// unknown or already finished tasks.
    pub async fn cancel_task(&self, id: u64) -> WmtsResult<()> {
        let task = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| WmtsError::not_found("Seeding task", id.to_string()))?;
        task.cancel();
        info!(task_id = id, remaining = task.remaining_tiles(), "Seeding task cancelled");
        Ok(())
    }

    /// Delete every cached tile of a layer. A missing folder is fine.
    pub async fn clear_layer_cache(&self, layer: &str) -> WmtsResult<()> {
        let path = self.catalog.paths.layer_path(layer)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(layer = %layer, path = %path.display(), "Cleared layer cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(layer = %layer, path = %path.display(), error = %e, "Cannot clear layer cache");
                Err(WmtsError::Io(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}
