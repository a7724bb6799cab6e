//! Application state and shared resources.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use tile_store::{
    FilePathGenerator, LayerRepository, MapSourceRepository, ServerOptions,
    TileMatrixSetRepository,
};
use wmts_common::{CoordinateTransform, MimeTypeRegistry, SrsRegistry, WebMercatorTransform, WmtsResult};

use crate::download::{RateLimiter, TileDownloader, TileFetcher};
use crate::metrics::SeedMetrics;
use crate::seeding::SeedingService;
use crate::task::TaskRegistry;

/// Configuration loaded once at startup. Only the layer repository changes
/// afterwards.
pub struct Catalog {
    pub options: ServerOptions,
    pub srs: &'static SrsRegistry,
    pub mime_types: MimeTypeRegistry,
    pub map_sources: MapSourceRepository,
    pub tile_matrix_sets: TileMatrixSetRepository,
    pub layers: LayerRepository,
    pub paths: FilePathGenerator,
    pub transform: Arc<dyn CoordinateTransform>,
}

impl Catalog {
    /// Validate `options` and read every configuration directory.
    pub fn load(options: ServerOptions) -> WmtsResult<Self> {
        options.validate_configuration()?;

        let srs = SrsRegistry::global();
        let mime_types = options.mime_registry();
        let map_sources = MapSourceRepository::load(&options.map_sources_path)?;
        let tile_matrix_sets = TileMatrixSetRepository::load(&options.tile_matrix_sets_path, srs)?;
        let layers = LayerRepository::load(&options.layers_path, &tile_matrix_sets, &mime_types)?;
        let paths = FilePathGenerator::new(&options.cache_root);

        info!(
            cache_root = %options.cache_root.display(),
            map_sources = map_sources.list().len(),
            tile_matrix_sets = tile_matrix_sets.list().len(),
            "Configuration loaded"
        );

        Ok(Self {
            options,
            srs,
            mime_types,
            map_sources,
            tile_matrix_sets,
            layers,
            paths,
            transform: Arc::new(WebMercatorTransform),
        })
    }
}

/// Shared application state.
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub seeding: SeedingService,
    pub metrics: Arc<SeedMetrics>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the seeding pipeline around `catalog`.
    pub fn new(
        catalog: Arc<Catalog>,
        fetcher: Arc<dyn TileFetcher>,
        limiter: Arc<RateLimiter>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        let metrics = Arc::new(SeedMetrics::new());
        let registry = Arc::new(TaskRegistry::new());
        let downloader = Arc::new(TileDownloader::new(
            fetcher,
            limiter,
            registry.clone(),
            metrics.clone(),
        ));
        let seeding = SeedingService::new(catalog.clone(), registry, downloader, metrics.clone());

        Self {
            catalog,
            seeding,
            metrics,
            prometheus,
        }
    }
}
