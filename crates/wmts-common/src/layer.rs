//! Layer definitions and their caches.
//!
//! A [`LayerDefinition`] groups one or more [`LayerCache`]s, each binding a
//! tile matrix set to a style and an output format. Definitions are read from
//! JSON documents at startup or created through the API, and are immutable
//! afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bbox::BoundingBox;
use crate::error::{WmtsError, WmtsResult};
use crate::iteration::{TileIter, TileIterationRequest};
use crate::limits::TileMatrixSetLimits;
use crate::mime::{MimeType, MimeTypeRegistry};
use crate::tile::TileMatrixSet;

pub const DEFAULT_STYLE: &str = "default";

/// Resolves tile matrix set identifiers while building layers.
pub trait TileMatrixSetLookup {
    fn tile_matrix_set(&self, identifier: &str) -> Option<Arc<TileMatrixSet>>;
}

/// Keys are expected in lower case.
impl TileMatrixSetLookup for HashMap<String, Arc<TileMatrixSet>> {
    fn tile_matrix_set(&self, identifier: &str) -> Option<Arc<TileMatrixSet>> {
        self.get(&identifier.to_lowercase()).cloned()
    }
}

// =============================================================================
// Configuration documents
// =============================================================================

/// On-disk layout of cached tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilePathScheme {
    /// `{style}/{gridset}/{zoom}/{col}-{row}.{ext}`
    #[default]
    Xyz,
    /// Accepted in configuration but not supported for reading or writing.
    Geowebcache,
}

impl fmt::Display for FilePathScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilePathScheme::Xyz => write!(f, "xyz"),
            FilePathScheme::Geowebcache => write!(f, "geowebcache"),
        }
    }
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

/// JSON form of a cache, in stored definitions and creation requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOptions {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tile_matrix_set: String,
    #[serde(default = "default_style")]
    pub style: String,
    /// MIME type (or internal name) of the stored tiles.
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_matrix_set_limits: Option<TileMatrixSetLimits>,
}

/// JSON form of a layer definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerOptions {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub map_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wgs84_extent: Option<BoundingBox>,
    #[serde(default)]
    pub file_path_scheme: FilePathScheme,
    #[serde(default)]
    pub caches: Vec<CacheOptions>,
}

/// Body of a create-layer request. Same shape as a stored definition; cache
/// limits are usually left out and derived from the WGS84 extent.
pub type LayerCreationRequest = LayerOptions;

impl LayerOptions {
    /// Structural checks that need no I/O. Fails with Validation or NotFound.
    pub fn validate(
        &self,
        tile_matrix_sets: &dyn TileMatrixSetLookup,
        mime_types: &MimeTypeRegistry,
    ) -> WmtsResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(WmtsError::validation("identifier", "cannot be empty"));
        }
        if self.map_source.trim().is_empty() {
            return Err(WmtsError::validation("mapSource", "cannot be empty"));
        }
        if self.caches.is_empty() {
            return Err(WmtsError::validation(
                "caches",
                format!("layer '{}' declares no cache", self.identifier),
            ));
        }

        for (i, cache) in self.caches.iter().enumerate() {
            if self.caches[..i]
                .iter()
                .any(|c| c.identifier == cache.identifier)
            {
                return Err(WmtsError::validation(
                    "caches",
                    format!("duplicate cache identifier '{}'", cache.identifier),
                ));
            }
            cache.validate(tile_matrix_sets, mime_types)?;
        }

        Ok(())
    }
}

impl CacheOptions {
    pub fn validate(
        &self,
        tile_matrix_sets: &dyn TileMatrixSetLookup,
        mime_types: &MimeTypeRegistry,
    ) -> WmtsResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(WmtsError::validation("cache.identifier", "cannot be empty"));
        }
        if self.style.trim().is_empty() {
            return Err(WmtsError::validation("cache.style", "cannot be empty"));
        }
        if mime_types.resolve(&self.format).is_none() {
            return Err(WmtsError::validation(
                "cache.format",
                format!("unsupported mime-type '{}'", self.format),
            ));
        }

        let tms = tile_matrix_sets
            .tile_matrix_set(&self.tile_matrix_set)
            .ok_or_else(|| WmtsError::not_found("Tile matrix set", &self.tile_matrix_set))?;

        let min = self.min_zoom.unwrap_or(0);
        let max = self.max_zoom.unwrap_or_else(|| tms.max_zoom());
        if max > tms.max_zoom() {
            return Err(WmtsError::validation(
                "cache.maxZoom",
                format!(
                    "{} exceeds the {} levels of '{}'",
                    max,
                    tms.len(),
                    tms.identifier()
                ),
            ));
        }
        if min > max {
            return Err(WmtsError::validation(
                "cache.minZoom",
                format!("min zoom {} is greater than max zoom {}", min, max),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LayerCache
// =============================================================================

/// A styled, formatted rendering of a layer on one tile matrix set.
#[derive(Debug, Clone)]
pub struct LayerCache {
    identifier: String,
    label: String,
    description: Option<String>,
    tile_matrix_set: Arc<TileMatrixSet>,
    style: String,
    format: MimeType,
    min_zoom: Option<usize>,
    max_zoom: Option<usize>,
    tile_matrix_set_limits: Option<TileMatrixSetLimits>,
}

impl LayerCache {
    pub fn from_options(
        options: &CacheOptions,
        tile_matrix_sets: &dyn TileMatrixSetLookup,
        mime_types: &MimeTypeRegistry,
    ) -> WmtsResult<Self> {
        options.validate(tile_matrix_sets, mime_types)?;

        let tile_matrix_set = tile_matrix_sets
            .tile_matrix_set(&options.tile_matrix_set)
            .ok_or_else(|| WmtsError::not_found("Tile matrix set", &options.tile_matrix_set))?;
        let format = mime_types
            .resolve(&options.format)
            .cloned()
            .ok_or_else(|| WmtsError::not_found("Mime type", &options.format))?;

        Ok(Self {
            identifier: options.identifier.clone(),
            label: options
                .label
                .clone()
                .unwrap_or_else(|| options.identifier.clone()),
            description: options.description.clone(),
            tile_matrix_set,
            style: options.style.clone(),
            format,
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            tile_matrix_set_limits: options.tile_matrix_set_limits.clone(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tile_matrix_set(&self) -> &Arc<TileMatrixSet> {
        &self.tile_matrix_set
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn format(&self) -> &MimeType {
        &self.format
    }

    pub fn tile_matrix_set_limits(&self) -> Option<&TileMatrixSetLimits> {
        self.tile_matrix_set_limits.as_ref()
    }

    /// Configured zoom range, defaulting to every level of the matrix set.
    pub fn zoom_range(&self) -> (usize, usize) {
        (
            self.min_zoom.unwrap_or(0),
            self.max_zoom
                .unwrap_or_else(|| self.tile_matrix_set.max_zoom()),
        )
    }

    pub fn to_options(&self) -> CacheOptions {
        CacheOptions {
            identifier: self.identifier.clone(),
            label: Some(self.label.clone()),
            description: self.description.clone(),
            tile_matrix_set: self.tile_matrix_set.identifier().to_string(),
            style: self.style.clone(),
            format: self.format.mime_type.clone(),
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            tile_matrix_set_limits: self.tile_matrix_set_limits.clone(),
        }
    }
}

// =============================================================================
// LayerDefinition
// =============================================================================

/// A WMTS `ResourceURL` entry advertising a REST template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUrl {
    pub format: String,
    pub resource_type: String,
    pub template: String,
}

/// A named layer: its caches, upstream source and storage layout.
#[derive(Debug, Clone)]
pub struct LayerDefinition {
    identifier: String,
    label: String,
    description: Option<String>,
    map_source: String,
    wgs84_extent: Option<BoundingBox>,
    file_path_scheme: FilePathScheme,
    caches: Vec<LayerCache>,
}

impl LayerDefinition {
    pub fn from_options(
        options: &LayerOptions,
        tile_matrix_sets: &dyn TileMatrixSetLookup,
        mime_types: &MimeTypeRegistry,
    ) -> WmtsResult<Self> {
        options.validate(tile_matrix_sets, mime_types)?;

        let caches = options
            .caches
            .iter()
            .map(|c| LayerCache::from_options(c, tile_matrix_sets, mime_types))
            .collect::<WmtsResult<Vec<_>>>()?;

        Ok(Self {
            identifier: options.identifier.clone(),
            label: options
                .label
                .clone()
                .unwrap_or_else(|| options.identifier.clone()),
            description: options.description.clone(),
            map_source: options.map_source.clone(),
            wgs84_extent: options.wgs84_extent,
            file_path_scheme: options.file_path_scheme,
            caches,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn map_source(&self) -> &str {
        &self.map_source
    }

    pub fn wgs84_extent(&self) -> Option<BoundingBox> {
        self.wgs84_extent
    }

    pub fn file_path_scheme(&self) -> FilePathScheme {
        self.file_path_scheme
    }

    pub fn caches(&self) -> &[LayerCache] {
        &self.caches
    }

    /// Exact-match cache lookup.
    pub fn get_cache(&self, identifier: &str) -> Option<&LayerCache> {
        self.caches.iter().find(|c| c.identifier == identifier)
    }

    /// Cache serving `style` on the tile matrix set `tile_matrix_set`.
    pub fn find_cache(&self, tile_matrix_set: &str, style: &str) -> Option<&LayerCache> {
        self.caches.iter().find(|c| {
            c.tile_matrix_set.identifier() == tile_matrix_set && c.style == style
        })
    }

    /// Lazily enumerate the tiles of `request`, ordered by zoom, then row,
    /// then column.
    pub fn iterate_tiles<'r>(&'r self, request: &'r TileIterationRequest<'_>) -> TileIter<'r> {
        TileIter::new(self, request)
    }

    /// REST resource template for `cache`, with the layer identifier filled in.
    pub fn url_template(&self, base_url: &str, cache: &LayerCache) -> ResourceUrl {
        ResourceUrl {
            format: cache.format.mime_type.clone(),
            resource_type: "tile".to_string(),
            template: format!(
                "{}/wmts/{}/{{Style}}/{{TileMatrixSet}}/{{TileMatrix}}/{{TileRow}}/{{TileCol}}.{}",
                base_url.trim_end_matches('/'),
                self.identifier,
                cache.format.file_extension
            ),
        }
    }

    pub fn to_options(&self) -> LayerOptions {
        LayerOptions {
            identifier: self.identifier.clone(),
            label: Some(self.label.clone()),
            description: self.description.clone(),
            map_source: self.map_source.clone(),
            wgs84_extent: self.wgs84_extent,
            file_path_scheme: self.file_path_scheme,
            caches: self.caches.iter().map(LayerCache::to_options).collect(),
        }
    }
}
