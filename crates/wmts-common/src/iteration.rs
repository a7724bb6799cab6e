//! Tile enumeration over a layer cache.

use std::collections::BTreeMap;

use crate::error::{WmtsError, WmtsResult};
use crate::layer::{LayerCache, LayerDefinition};
use crate::limits::{TileMatrixLimits, TileMatrixSetLimits};
use crate::mime::MimeType;
use crate::tile::{TileMatrix, TileMatrixSet};

/// Parameters of one enumeration pass.
#[derive(Debug, Clone)]
pub struct TileIterationRequest<'a> {
    layer: &'a LayerDefinition,
    cache: &'a LayerCache,
    limits: Option<TileMatrixSetLimits>,
    start_zoom: usize,
    end_zoom: usize,
    parameters: Option<BTreeMap<String, String>>,
}

impl<'a> TileIterationRequest<'a> {
    /// Fails when `cache` is not one of the layer's caches or when the zoom
    /// range does not fit the cache's tile matrix set.
    pub fn new(
        layer: &'a LayerDefinition,
        cache: &'a LayerCache,
        start_zoom: usize,
        end_zoom: usize,
        limits: Option<TileMatrixSetLimits>,
    ) -> WmtsResult<Self> {
        if layer.get_cache(cache.identifier()).is_none() {
            return Err(WmtsError::not_found("Cache", cache.identifier()));
        }

        let tms = cache.tile_matrix_set();
        if end_zoom > tms.max_zoom() {
            return Err(WmtsError::OutOfRange(format!(
                "end zoom {} outside 0..={} of '{}'",
                end_zoom,
                tms.max_zoom(),
                tms.identifier()
            )));
        }
        if start_zoom > end_zoom {
            return Err(WmtsError::validation(
                "startZoom",
                format!("start zoom {} is greater than end zoom {}", start_zoom, end_zoom),
            ));
        }

        Ok(Self {
            layer,
            cache,
            limits,
            start_zoom,
            end_zoom,
            parameters: None,
        })
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn layer(&self) -> &'a LayerDefinition {
        self.layer
    }

    pub fn cache(&self) -> &'a LayerCache {
        self.cache
    }

    pub fn limits(&self) -> Option<&TileMatrixSetLimits> {
        self.limits.as_ref()
    }

    pub fn start_zoom(&self) -> usize {
        self.start_zoom
    }

    pub fn end_zoom(&self) -> usize {
        self.end_zoom
    }

    pub fn parameters(&self) -> Option<&BTreeMap<String, String>> {
        self.parameters.as_ref()
    }

    /// Cache limits combined with the request limits.
    pub fn effective_limits(&self) -> Option<TileMatrixSetLimits> {
        TileMatrixSetLimits::intersect(self.cache.tile_matrix_set_limits(), self.limits.as_ref())
    }

    /// Number of tiles the enumeration yields, computed per level.
    pub fn tile_count(&self) -> u64 {
        let limits = self.effective_limits();
        self.cache.tile_matrix_set().tile_matrices()[self.start_zoom..=self.end_zoom]
            .iter()
            .map(|m| LevelBounds::resolve(m, limits.as_ref()).tile_count())
            .sum()
    }
}

/// One enumerated tile.
#[derive(Debug, Clone, Copy)]
pub struct TileObject<'a> {
    pub layer_name: &'a str,
    pub style: &'a str,
    pub mime_type: &'a MimeType,
    pub tile_matrix_set: &'a TileMatrixSet,
    pub tile_matrix: &'a TileMatrix,
    pub col: u32,
    pub row: u32,
    pub zoom: usize,
    pub parameters: Option<&'a BTreeMap<String, String>>,
}

impl TileObject<'_> {
    /// Identifier of the tile matrix set (the "gridset").
    pub fn grid_set_id(&self) -> &str {
        self.tile_matrix_set.identifier()
    }

    /// `(col, row, zoom)`
    pub fn xyz(&self) -> (u32, u32, usize) {
        (self.col, self.row, self.zoom)
    }
}

/// Tile index bounds of one level, clamped to the matrix.
#[derive(Debug, Clone, Copy)]
struct LevelBounds<'a> {
    matrix: &'a TileMatrix,
    min_row: i64,
    max_row: i64,
    min_col: i64,
    max_col: i64,
}

impl<'a> LevelBounds<'a> {
    fn resolve(matrix: &'a TileMatrix, limits: Option<&TileMatrixSetLimits>) -> Self {
        let full = matrix.full_limits();
        let level: &TileMatrixLimits = limits
            .and_then(|l| l.get(matrix.identifier()))
            .unwrap_or(&full);

        Self {
            matrix,
            min_row: level.min_tile_row.max(0),
            max_row: level.max_tile_row.min(full.max_tile_row),
            min_col: level.min_tile_col.max(0),
            max_col: level.max_tile_col.min(full.max_tile_col),
        }
    }

    fn tile_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.max_row - self.min_row + 1) as u64 * (self.max_col - self.min_col + 1) as u64
    }

    fn is_empty(&self) -> bool {
        self.min_row > self.max_row || self.min_col > self.max_col
    }
}

/// Pull-based enumerator produced by [`LayerDefinition::iterate_tiles`].
#[derive(Debug)]
pub struct TileIter<'a> {
    layer_name: &'a str,
    cache: &'a LayerCache,
    parameters: Option<&'a BTreeMap<String, String>>,
    limits: Option<TileMatrixSetLimits>,
    next_zoom: usize,
    end_zoom: usize,
    level: Option<LevelBounds<'a>>,
    row: i64,
    col: i64,
}

impl<'a> TileIter<'a> {
    pub(crate) fn new(layer: &'a LayerDefinition, request: &'a TileIterationRequest<'_>) -> Self {
        Self {
            layer_name: layer.identifier(),
            cache: request.cache,
            parameters: request.parameters.as_ref(),
            limits: request.effective_limits(),
            next_zoom: request.start_zoom,
            end_zoom: request.end_zoom,
            level: None,
            row: 0,
            col: 0,
        }
    }

    /// Move to the next level with at least one tile.
    fn advance_level(&mut self) -> bool {
        let tms: &'a TileMatrixSet = self.cache.tile_matrix_set();
        while self.next_zoom <= self.end_zoom {
            let Some(matrix) = tms.tile_matrices().get(self.next_zoom) else {
                return false;
            };
            self.next_zoom += 1;

            let bounds = LevelBounds::resolve(matrix, self.limits.as_ref());
            if !bounds.is_empty() {
                self.row = bounds.min_row;
                self.col = bounds.min_col;
                self.level = Some(bounds);
                return true;
            }
        }
        false
    }
}

impl<'a> Iterator for TileIter<'a> {
    type Item = TileObject<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(bounds) = self.level {
                if self.row <= bounds.max_row {
                    let tile = TileObject {
                        layer_name: self.layer_name,
                        style: self.cache.style(),
                        mime_type: self.cache.format(),
                        tile_matrix_set: self.cache.tile_matrix_set(),
                        tile_matrix: bounds.matrix,
                        col: self.col as u32,
                        row: self.row as u32,
                        zoom: bounds.matrix.level(),
                        parameters: self.parameters,
                    };

                    self.col += 1;
                    if self.col > bounds.max_col {
                        self.col = bounds.min_col;
                        self.row += 1;
                    }
                    return Some(tile);
                }
                self.level = None;
            }

            if !self.advance_level() {
                return None;
            }
        }
    }
}
