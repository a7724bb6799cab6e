//! WMTS Tile Matrix and TileMatrixSet definitions.
//!
//! Implements the OGC WMTS grid model: per-level resolution, conversion
//! between CRS coordinates and tile indices, and the restriction of a
//! matrix (set) to the tiles covering an extent.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bbox::BoundingBox;
use crate::crs::{SpatialReference, SrsRegistry};
use crate::error::{WmtsError, WmtsResult};
use crate::limits::{TileMatrixLimits, TileMatrixSetLimits};

/// Standardized rendering pixel size in meters (0.28mm).
pub const STANDARD_PIXEL_SIZE: f64 = 0.00028;

/// Half the Web Mercator world width in meters.
pub const WEB_MERCATOR_MAX_EXTENT: f64 = 20037508.342789244;

// =============================================================================
// Configuration documents
// =============================================================================

/// JSON form of one tile matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixOptions {
    pub identifier: String,
    pub scale_denominator: f64,
    pub top_left_corner: [f64; 2],
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: u32,
    pub matrix_height: u32,
}

/// JSON form of a tile matrix set, as stored in the tile matrix set directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixSetOptions {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "supportedCRS", alias = "crs")]
    pub supported_crs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub well_known_scale_set: Option<String>,
    pub tile_matrix: Vec<TileMatrixOptions>,
}

// =============================================================================
// TileMatrix
// =============================================================================

/// A single tile matrix (zoom level) definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrix {
    identifier: String,
    level: usize,
    scale_denominator: f64,
    top_left_corner: (f64, f64),
    tile_width: u32,
    tile_height: u32,
    matrix_width: u32,
    matrix_height: u32,
    resolution: f64,
}

impl TileMatrix {
    /// Build a level from its options. `meters_per_unit` comes from the
    /// parent set's reference system.
    pub fn new(options: &TileMatrixOptions, level: usize, meters_per_unit: f64) -> WmtsResult<Self> {
        if options.identifier.is_empty() {
            return Err(WmtsError::validation("tileMatrix.identifier", "cannot be empty"));
        }
        if !(options.scale_denominator > 0.0) {
            return Err(WmtsError::validation(
                "tileMatrix.scaleDenominator",
                format!("must be positive in level '{}'", options.identifier),
            ));
        }
        if !(meters_per_unit > 0.0) {
            return Err(WmtsError::validation("metersPerUnit", "must be positive"));
        }
        if options.tile_width == 0
            || options.tile_height == 0
            || options.matrix_width == 0
            || options.matrix_height == 0
        {
            return Err(WmtsError::validation(
                "tileMatrix",
                format!(
                    "tile and matrix dimensions must be at least 1 in level '{}'",
                    options.identifier
                ),
            ));
        }

        Ok(Self {
            identifier: options.identifier.clone(),
            level,
            scale_denominator: options.scale_denominator,
            top_left_corner: (options.top_left_corner[0], options.top_left_corner[1]),
            tile_width: options.tile_width,
            tile_height: options.tile_height,
            matrix_width: options.matrix_width,
            matrix_height: options.matrix_height,
            resolution: STANDARD_PIXEL_SIZE * options.scale_denominator / meters_per_unit,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn scale_denominator(&self) -> f64 {
        self.scale_denominator
    }

    pub fn top_left_corner(&self) -> (f64, f64) {
        self.top_left_corner
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn matrix_width(&self) -> u32 {
        self.matrix_width
    }

    pub fn matrix_height(&self) -> u32 {
        self.matrix_height
    }

    /// CRS units per pixel.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Tile width in CRS units.
    pub fn tile_width_units(&self) -> f64 {
        self.tile_width as f64 * self.resolution
    }

    /// Tile height in CRS units.
    pub fn tile_height_units(&self) -> f64 {
        self.tile_height as f64 * self.resolution
    }

    pub fn tile_count(&self) -> u64 {
        self.matrix_width as u64 * self.matrix_height as u64
    }

    /// Extent covered by the whole matrix. Rows grow downward from the origin.
    pub fn bounding_box(&self) -> BoundingBox {
        let (left, top) = self.top_left_corner;
        BoundingBox::new(
            left,
            top - self.matrix_height as f64 * self.tile_height_units(),
            left + self.matrix_width as f64 * self.tile_width_units(),
            top,
        )
    }

    pub fn contains_tile(&self, col: u32, row: u32) -> bool {
        col < self.matrix_width && row < self.matrix_height
    }

    /// Get the extent of a specific tile.
    pub fn tile_extent(&self, col: u32, row: u32) -> WmtsResult<BoundingBox> {
        if !self.contains_tile(col, row) {
            return Err(WmtsError::OutOfRange(format!(
                "tile {}/{} outside {}x{} matrix '{}'",
                col, row, self.matrix_width, self.matrix_height, self.identifier
            )));
        }

        let span_x = self.tile_width_units();
        let span_y = self.tile_height_units();

        let min_x = self.top_left_corner.0 + span_x * col as f64;
        let min_y = self.top_left_corner.1 - span_y * (row as f64 + 1.0);

        Ok(BoundingBox::new(min_x, min_y, min_x + span_x, min_y + span_y))
    }

    /// Fractional tile-space position of a CRS location. Neither rounded nor clamped.
    pub fn tile_coordinates(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.top_left_corner.0) / self.tile_width_units(),
            (self.top_left_corner.1 - y) / self.tile_height_units(),
        )
    }

    /// Tile range covering `extent`, clamped to the matrix.
    ///
    /// The upper-right corner bounds the minimum row and the lower-left
    /// corner the maximum row since rows grow downward. An extent entirely
    /// outside the matrix yields inverted bounds, which count zero tiles.
    pub fn limits_for_extent(&self, extent: &BoundingBox) -> TileMatrixLimits {
        let (ll_x, ll_y) = self.tile_coordinates(extent.min_x, extent.min_y);
        let (ur_x, ur_y) = self.tile_coordinates(extent.max_x, extent.max_y);

        TileMatrixLimits::new(
            self.identifier.clone(),
            (ur_y.floor() as i64).max(0),
            (ll_y.floor() as i64).min(self.matrix_height as i64 - 1),
            (ll_x.floor() as i64).max(0),
            (ur_x.floor() as i64).min(self.matrix_width as i64 - 1),
        )
    }

    /// Limits covering every tile of the matrix.
    pub fn full_limits(&self) -> TileMatrixLimits {
        TileMatrixLimits::new(
            self.identifier.clone(),
            0,
            self.matrix_height as i64 - 1,
            0,
            self.matrix_width as i64 - 1,
        )
    }

    pub fn to_options(&self) -> TileMatrixOptions {
        TileMatrixOptions {
            identifier: self.identifier.clone(),
            scale_denominator: self.scale_denominator,
            top_left_corner: [self.top_left_corner.0, self.top_left_corner.1],
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            matrix_width: self.matrix_width,
            matrix_height: self.matrix_height,
        }
    }
}

// =============================================================================
// TileMatrixSet
// =============================================================================

/// A complete tile matrix set definition.
#[derive(Debug, Clone)]
pub struct TileMatrixSet {
    identifier: String,
    title: Option<String>,
    crs: String,
    spatial_reference: Arc<SpatialReference>,
    bounding_box: BoundingBox,
    well_known_scale_set: Option<String>,
    tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Build a set from its JSON options. Level numbers are list positions.
    pub fn from_options(options: &TileMatrixSetOptions, registry: &SrsRegistry) -> WmtsResult<Self> {
        if options.identifier.is_empty() {
            return Err(WmtsError::validation("identifier", "cannot be empty"));
        }
        if options.tile_matrix.is_empty() {
            return Err(WmtsError::validation(
                "tileMatrix",
                format!("tile matrix set '{}' has no levels", options.identifier),
            ));
        }

        let spatial_reference = registry.require(&options.supported_crs)?.clone();
        let tile_matrices = options
            .tile_matrix
            .iter()
            .enumerate()
            .map(|(level, m)| TileMatrix::new(m, level, spatial_reference.meters_per_unit()))
            .collect::<WmtsResult<Vec<_>>>()?;

        let bounding_box = options
            .bounding_box
            .unwrap_or_else(|| tile_matrices[0].bounding_box());

        Ok(Self {
            identifier: options.identifier.clone(),
            title: options.title.clone(),
            crs: options.supported_crs.clone(),
            spatial_reference,
            bounding_box,
            well_known_scale_set: options.well_known_scale_set.clone(),
            tile_matrices,
        })
    }

    /// Standard Web Mercator (Google/OSM) tile matrix set, levels 0 to 21.
    pub fn web_mercator_quad() -> WmtsResult<Self> {
        let srs = SrsRegistry::global().require("epsg:3857")?;
        let level0 = TileMatrixOptions {
            identifier: "0".to_string(),
            scale_denominator: 559082264.0287178,
            top_left_corner: [-WEB_MERCATOR_MAX_EXTENT, WEB_MERCATOR_MAX_EXTENT],
            tile_width: 256,
            tile_height: 256,
            matrix_width: 1,
            matrix_height: 1,
        };

        let mut set = build_regular_tile_matrix_set("WebMercatorQuad", srs, None, &level0, 21, None)?;
        set.well_known_scale_set =
            Some("http://www.opengis.net/def/wkss/OGC/1.0/GoogleMapsCompatible".to_string());
        Ok(set)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Configured CRS identifier.
    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn spatial_reference(&self) -> &Arc<SpatialReference> {
        &self.spatial_reference
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn tile_matrices(&self) -> &[TileMatrix] {
        &self.tile_matrices
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.tile_matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tile_matrices.is_empty()
    }

    /// Highest zoom level index.
    pub fn max_zoom(&self) -> usize {
        self.tile_matrices.len().saturating_sub(1)
    }

    pub fn matrix_at(&self, zoom: usize) -> WmtsResult<&TileMatrix> {
        self.tile_matrices.get(zoom).ok_or_else(|| {
            WmtsError::OutOfRange(format!(
                "zoom {} outside 0..={} of '{}'",
                zoom,
                self.max_zoom(),
                self.identifier
            ))
        })
    }

    /// Zoom level of the matrix with this exact identifier.
    pub fn zoom_level_of(&self, identifier: &str) -> Option<usize> {
        self.tile_matrices
            .iter()
            .position(|m| m.identifier == identifier)
    }

    /// Zoom level of a matrix owned by this set, compared by reference.
    pub fn zoom_level_of_matrix(&self, matrix: &TileMatrix) -> Option<usize> {
        self.tile_matrices
            .iter()
            .position(|m| std::ptr::eq(m, matrix))
    }

    /// Get a tile matrix by identifier.
    pub fn matrix(&self, identifier: &str) -> Option<&TileMatrix> {
        self.zoom_level_of(identifier).map(|z| &self.tile_matrices[z])
    }

    /// Resolve an optional inclusive zoom range against the set.
    pub fn zoom_range(&self, start: Option<usize>, end: Option<usize>) -> WmtsResult<(usize, usize)> {
        let start = start.unwrap_or(0);
        let end = end.unwrap_or_else(|| self.max_zoom());

        if end >= self.len() {
            return Err(WmtsError::OutOfRange(format!(
                "end zoom {} outside 0..={} of '{}'",
                end,
                self.max_zoom(),
                self.identifier
            )));
        }
        if start > end {
            return Err(WmtsError::validation(
                "startZoom",
                format!("start zoom {} is greater than end zoom {}", start, end),
            ));
        }

        Ok((start, end))
    }

    /// Per-level limits of `extent` (expressed in this set's CRS).
    pub fn limits_for_extent(
        &self,
        extent: &BoundingBox,
        min_zoom: Option<usize>,
        max_zoom: Option<usize>,
    ) -> WmtsResult<TileMatrixSetLimits> {
        let (start, end) = self.zoom_range(min_zoom, max_zoom)?;

        Ok(self.tile_matrices[start..=end]
            .iter()
            .map(|m| m.limits_for_extent(extent))
            .collect())
    }

    /// Sum of matrixWidth x matrixHeight over the inclusive zoom range.
    pub fn total_tile_count(&self, start: Option<usize>, end: Option<usize>) -> WmtsResult<u64> {
        let (start, end) = self.zoom_range(start, end)?;
        Ok(self.tile_matrices[start..=end]
            .iter()
            .map(TileMatrix::tile_count)
            .sum())
    }

    pub fn to_options(&self) -> TileMatrixSetOptions {
        TileMatrixSetOptions {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            supported_crs: self.crs.clone(),
            bounding_box: Some(self.bounding_box),
            well_known_scale_set: self.well_known_scale_set.clone(),
            tile_matrix: self.tile_matrices.iter().map(TileMatrix::to_options).collect(),
        }
    }
}

/// Build a quad-tree style set: every level halves the scale denominator and
/// doubles the matrix dimensions of `level0`. Produces `max_level + 1` levels.
///
/// `name_generator` maps a level number to its identifier, defaulting to the
/// level number itself.
pub fn build_regular_tile_matrix_set(
    identifier: &str,
    spatial_reference: &Arc<SpatialReference>,
    bounding_box: Option<BoundingBox>,
    level0: &TileMatrixOptions,
    max_level: usize,
    name_generator: Option<&dyn Fn(usize) -> String>,
) -> WmtsResult<TileMatrixSet> {
    let mut tile_matrices = Vec::with_capacity(max_level + 1);

    for level in 0..=max_level {
        let factor = u32::try_from(level)
            .ok()
            .and_then(|l| 2u32.checked_pow(l))
            .ok_or_else(|| WmtsError::OutOfRange(format!("level {} is too deep", level)))?;
        let scale_identifier = match name_generator {
            Some(generate) => generate(level),
            None => level.to_string(),
        };

        let options = TileMatrixOptions {
            identifier: scale_identifier,
            scale_denominator: level0.scale_denominator / factor as f64,
            top_left_corner: level0.top_left_corner,
            tile_width: level0.tile_width,
            tile_height: level0.tile_height,
            matrix_width: level0.matrix_width.checked_mul(factor).ok_or_else(|| {
                WmtsError::OutOfRange(format!("matrix width overflows at level {}", level))
            })?,
            matrix_height: level0.matrix_height.checked_mul(factor).ok_or_else(|| {
                WmtsError::OutOfRange(format!("matrix height overflows at level {}", level))
            })?,
        };

        tile_matrices.push(TileMatrix::new(
            &options,
            level,
            spatial_reference.meters_per_unit(),
        )?);
    }

    let bounding_box = bounding_box.unwrap_or_else(|| tile_matrices[0].bounding_box());

    Ok(TileMatrixSet {
        identifier: identifier.to_string(),
        title: None,
        crs: spatial_reference.identifier().to_string(),
        spatial_reference: spatial_reference.clone(),
        bounding_box,
        well_known_scale_set: None,
        tile_matrices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TileMatrixSet {
        TileMatrixSet::web_mercator_quad().unwrap()
    }

    // ==========================================================================
    // TileMatrix tests
    // ==========================================================================

    #[test]
    fn test_resolution_uses_meters_per_unit() {
        let options = TileMatrixOptions {
            identifier: "0".to_string(),
            scale_denominator: 279541132.0143589,
            top_left_corner: [-180.0, 90.0],
            tile_width: 256,
            tile_height: 256,
            matrix_width: 2,
            matrix_height: 1,
        };
        let mpu = crate::crs::METERS_PER_DEGREE;
        let matrix = TileMatrix::new(&options, 0, mpu).unwrap();
        assert_eq!(matrix.resolution(), 0.00028 * 279541132.0143589 / mpu);
        assert!((matrix.resolution() - 0.703125).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let options = TileMatrixOptions {
            identifier: "0".to_string(),
            scale_denominator: 1000.0,
            top_left_corner: [0.0, 0.0],
            tile_width: 256,
            tile_height: 256,
            matrix_width: 0,
            matrix_height: 1,
        };
        assert!(matches!(
            TileMatrix::new(&options, 0, 1.0),
            Err(WmtsError::Validation { .. })
        ));
    }

    #[test]
    fn test_tile_extent_out_of_range() {
        let set = quad();
        let z1 = set.matrix_at(1).unwrap();
        assert!(z1.tile_extent(1, 1).is_ok());
        assert!(matches!(z1.tile_extent(2, 0), Err(WmtsError::OutOfRange(_))));
        assert!(matches!(z1.tile_extent(0, 2), Err(WmtsError::OutOfRange(_))));
    }

    #[test]
    fn test_tile_coordinates_are_fractional() {
        let set = quad();
        let z0 = set.matrix_at(0).unwrap();
        let (x, y) = z0.tile_coordinates(0.0, 0.0);
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);

        let (x, _) = z0.tile_coordinates(-3.0 * WEB_MERCATOR_MAX_EXTENT, 0.0);
        assert!(x < 0.0);
    }

    #[test]
    fn test_full_limits() {
        let set = quad();
        let limits = set.matrix_at(3).unwrap().full_limits();
        assert_eq!(limits.tile_count(), 64);
        assert_eq!(limits.max_tile_col, 7);
    }

    // ==========================================================================
    // TileMatrixSet tests
    // ==========================================================================

    #[test]
    fn test_web_mercator_quad() {
        let set = quad();
        assert_eq!(set.len(), 22);
        assert_eq!(set.matrix_at(21).unwrap().matrix_width(), 1 << 21);
        assert!((set.matrix_at(0).unwrap().resolution() - 156543.03392804097).abs() < 1e-6);
    }

    #[test]
    fn test_matrix_at_out_of_range() {
        let set = quad();
        assert!(set.matrix_at(21).is_ok());
        assert!(matches!(set.matrix_at(22), Err(WmtsError::OutOfRange(_))));
    }

    #[test]
    fn test_zoom_level_of() {
        let set = quad();
        assert_eq!(set.zoom_level_of("5"), Some(5));
        assert_eq!(set.zoom_level_of("EPSG:3857:5"), None);

        let m = set.matrix_at(7).unwrap();
        assert_eq!(set.zoom_level_of_matrix(m), Some(7));
        let detached = m.clone();
        assert_eq!(set.zoom_level_of_matrix(&detached), None);
    }

    #[test]
    fn test_total_tile_count() {
        let set = quad();
        assert_eq!(set.total_tile_count(Some(0), Some(2)).unwrap(), 21);
        assert_eq!(set.total_tile_count(Some(3), Some(3)).unwrap(), 64);
        assert!(set.total_tile_count(Some(3), Some(2)).is_err());
        assert!(set.total_tile_count(None, Some(22)).is_err());
    }

    #[test]
    fn test_from_options_unknown_crs() {
        let mut options = quad().to_options();
        options.supported_crs = "epsg:2056".to_string();
        let err = TileMatrixSet::from_options(&options, &SrsRegistry::builtin()).unwrap_err();
        assert!(matches!(err, WmtsError::NotFound { .. }));
    }

    #[test]
    fn test_from_options_derives_bbox_from_level0() {
        let mut options = quad().to_options();
        options.bounding_box = None;
        let set = TileMatrixSet::from_options(&options, &SrsRegistry::builtin()).unwrap();
        let bbox = set.bounding_box();
        assert!((bbox.max_x - WEB_MERCATOR_MAX_EXTENT).abs() < 1e-3);
        assert!((bbox.min_y + WEB_MERCATOR_MAX_EXTENT).abs() < 1e-3);
    }

    #[test]
    fn test_custom_name_generator() {
        let srs = SrsRegistry::global().require("epsg:3857").unwrap();
        let level0 = quad().matrix_at(0).unwrap().to_options();
        let name = |level: usize| format!("EPSG:3857:{}", level);
        let set = build_regular_tile_matrix_set("custom", srs, None, &level0, 3, Some(&name)).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.zoom_level_of("EPSG:3857:2"), Some(2));
        assert_eq!(set.crs(), "epsg:3857");
    }
}
