//! Layer definitions: loaded from the layers folder, extended at runtime
//! through [`LayerRepository::create_layer`].

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use wmts_common::{
    BoundingBox, CacheOptions, CoordinateTransform, LayerCreationRequest, LayerDefinition,
    LayerOptions, MimeTypeRegistry, SrsRegistry, TileMatrixSetLimits, TileMatrixSetLookup,
    WmtsError, WmtsResult,
};

use crate::path::sanitize_path;
use crate::repository::{json_documents, read_document, MapSourceRepository};

/// Layers keyed by lower-cased identifier.
pub struct LayerRepository {
    layers_path: PathBuf,
    layers: RwLock<BTreeMap<String, Arc<LayerDefinition>>>,
}

impl LayerRepository {
    /// An empty repository persisting new layers into `layers_path`.
    pub fn new(layers_path: impl Into<PathBuf>) -> Self {
        Self {
            layers_path: layers_path.into(),
            layers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Read every layer document of `layers_path`.
    pub fn load(
        layers_path: impl AsRef<Path>,
        tile_matrix_sets: &dyn TileMatrixSetLookup,
        mime_types: &MimeTypeRegistry,
    ) -> WmtsResult<Self> {
        let layers_path = layers_path.as_ref();
        let mut layers = BTreeMap::new();

        for path in json_documents(layers_path)? {
            let parsed = read_document(&path)
                .and_then(|json| Ok(serde_json::from_str::<LayerOptions>(&json)?))
                .and_then(|options| {
                    LayerDefinition::from_options(&options, tile_matrix_sets, mime_types)
                });

            match parsed {
                Ok(layer) => {
                    layers.insert(layer.identifier().to_lowercase(), Arc::new(layer));
                }
                Err(e) => warn!(error = %e, path = %path.display(), "Skipping layer definition"),
            }
        }

        info!(count = layers.len(), path = %layers_path.display(), "Loaded layers");
        Ok(Self {
            layers_path: layers_path.to_path_buf(),
            layers: RwLock::new(layers),
        })
    }

    pub async fn get(&self, identifier: &str) -> Option<Arc<LayerDefinition>> {
        self.layers
            .read()
            .await
            .get(&identifier.to_lowercase())
            .cloned()
    }

    /// Like [`get`](Self::get) but fails with NotFound.
    pub async fn require(&self, identifier: &str) -> WmtsResult<Arc<LayerDefinition>> {
        self.get(identifier)
            .await
            .ok_or_else(|| WmtsError::not_found("Layer", identifier))
    }

    pub async fn list(&self) -> Vec<Arc<LayerDefinition>> {
        self.layers.read().await.values().cloned().collect()
    }

    /// Validate, persist and register a new layer.
    ///
    /// Caches without explicit limits get limits covering the layer's WGS84
    /// extent (the request's, else the map source's) on their configured
    /// zoom range. A cache whose tile matrix set cannot be reached from
    /// WGS84 keeps no limits.
    pub async fn create_layer(
        &self,
        request: &LayerCreationRequest,
        map_sources: &MapSourceRepository,
        tile_matrix_sets: &(dyn TileMatrixSetLookup + Sync),
        mime_types: &MimeTypeRegistry,
        transform: &dyn CoordinateTransform,
    ) -> WmtsResult<Arc<LayerDefinition>> {
        request.validate(tile_matrix_sets, mime_types)?;

        // The identifier names the layer file; it must survive sanitizing
        // unchanged so two identifiers never share a file.
        if sanitize_path(&request.identifier) != request.identifier
            || request.identifier.contains('/')
        {
            return Err(WmtsError::validation(
                "identifier",
                format!("'{}' cannot be used as a file name", request.identifier),
            ));
        }

        let mut layers = self.layers.write().await;
        let key = request.identifier.to_lowercase();
        if layers.contains_key(&key) {
            return Err(WmtsError::validation(
                "identifier",
                format!("there is already a layer '{}'", request.identifier),
            ));
        }

        let source = map_sources.require(&request.map_source)?;
        let extent = request.wgs84_extent.or_else(|| source.wgs84_extent());

        let mut options = request.clone();
        if options.label.is_none() {
            options.label = Some(options.identifier.clone());
        }
        if let Some(extent) = extent {
            for cache in options.caches.iter_mut().filter(|c| c.tile_matrix_set_limits.is_none()) {
                cache.tile_matrix_set_limits =
                    cache_limits(&extent, cache, tile_matrix_sets, transform);
            }
        }

        let layer = LayerDefinition::from_options(&options, tile_matrix_sets, mime_types)?;

        let path = self.layers_path.join(format!("{}.json", options.identifier));
        let json = serde_json::to_string_pretty(&options)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(WmtsError::validation(
                    "identifier",
                    format!("layer file {} already exists", path.display()),
                ));
            }
            Err(e) => {
                return Err(WmtsError::Io(format!(
                    "Failed to create {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| WmtsError::Io(format!("Failed to write {}: {}", path.display(), e)))?;

        info!(layer = %options.identifier, path = %path.display(), "Created layer");

        let layer = Arc::new(layer);
        layers.insert(key, layer.clone());
        Ok(layer)
    }
}

fn cache_limits(
    wgs84_extent: &BoundingBox,
    cache: &CacheOptions,
    tile_matrix_sets: &dyn TileMatrixSetLookup,
    transform: &dyn CoordinateTransform,
) -> Option<TileMatrixSetLimits> {
    let tms = tile_matrix_sets.tile_matrix_set(&cache.tile_matrix_set)?;
    let wgs84 = SrsRegistry::global().get("epsg:4326")?;

    let computed = transform
        .transform_extent(wgs84_extent, wgs84, tms.spatial_reference())
        .and_then(|extent| tms.limits_for_extent(&extent, cache.min_zoom, cache.max_zoom));

    match computed {
        Ok(limits) => Some(limits),
        Err(e) => {
            warn!(
                cache = %cache.identifier,
                tile_matrix_set = %cache.tile_matrix_set,
                error = %e,
                "Cannot derive cache limits from the layer extent"
            );
            None
        }
    }
}
