//! Grid math tests for TileMatrix, TileMatrixSet and their limits.

use std::sync::Arc;

use test_utils::assert_approx_eq;
use wmts_common::bbox::BoundingBox;
use wmts_common::crs::SrsRegistry;
use wmts_common::limits::{TileMatrixLimits, TileMatrixSetLimits};
use wmts_common::tile::{build_regular_tile_matrix_set, TileMatrix, TileMatrixOptions, TileMatrixSet};

fn mercator_level0() -> TileMatrixOptions {
    TileMatrixOptions {
        identifier: "0".to_string(),
        scale_denominator: 559082263.9508929,
        top_left_corner: [-20037508.34, 20037508.0],
        tile_width: 256,
        tile_height: 256,
        matrix_width: 1,
        matrix_height: 1,
    }
}

fn regular_set(max_level: usize) -> TileMatrixSet {
    let srs = SrsRegistry::global().require("EPSG:3857").unwrap();
    build_regular_tile_matrix_set("test", srs, None, &mercator_level0(), max_level, None).unwrap()
}

// ============================================================================
// TileMatrix
// ============================================================================

#[test]
fn test_level0_extent() {
    let matrix = TileMatrix::new(&mercator_level0(), 0, 1.0).unwrap();
    assert_approx_eq!(matrix.resolution(), 156543.03, 0.01);

    let extent = matrix.tile_extent(0, 0).unwrap();
    assert_approx_eq!(extent.min_x, -20037508.34, 1.0);
    assert_approx_eq!(extent.min_y, -20037508.0, 1.0);
    assert_approx_eq!(extent.max_x, 20037508.34, 1.0);
    assert_approx_eq!(extent.max_y, 20037508.0, 1e-6);
}

#[test]
fn test_resolution_derivation() {
    let srs = SrsRegistry::builtin();
    for id in ["epsg:4326", "epsg:3857"] {
        let mpu = srs.require(id).unwrap().meters_per_unit();
        let matrix = TileMatrix::new(&mercator_level0(), 0, mpu).unwrap();
        assert_eq!(matrix.resolution(), 0.00028 * 559082263.9508929 / mpu);
    }
}

#[test]
fn test_tile_extent_round_trip() {
    let set = regular_set(4);
    let matrix = set.matrix_at(4).unwrap();
    for (col, row) in [(0, 0), (3, 7), (15, 15), (9, 2)] {
        let extent = matrix.tile_extent(col, row).unwrap();
        let (x, y) = matrix.tile_coordinates(extent.min_x, extent.max_y);
        assert_approx_eq!(x, col as f64, 1e-9);
        assert_approx_eq!(y, row as f64, 1e-9);

        let (_, bottom) = matrix.tile_coordinates(extent.min_x, extent.min_y);
        assert_approx_eq!(bottom, row as f64 + 1.0, 1e-9);
    }
}

#[test]
fn test_limits_clamped_to_matrix() {
    let set = regular_set(3);
    let matrix = set.matrix_at(3).unwrap();
    let huge = BoundingBox::new(-1e9, -1e9, 1e9, 1e9);
    let limits = matrix.limits_for_extent(&huge);
    assert_eq!(limits, TileMatrixLimits::new("3", 0, 7, 0, 7));
    assert_eq!(limits.tile_count(), 64);
}

#[test]
fn test_limits_corner_selection() {
    let set = regular_set(2);
    let matrix = set.matrix_at(2).unwrap();

    // Inside tile (col 2, row 1) only.
    let tile = matrix.tile_extent(2, 1).unwrap();
    let inner = BoundingBox::new(
        tile.min_x + 10.0,
        tile.min_y + 10.0,
        tile.max_x - 10.0,
        tile.max_y - 10.0,
    );
    assert_eq!(matrix.limits_for_extent(&inner), TileMatrixLimits::new("2", 1, 1, 2, 2));

    // Spanning from tile (1, 2) up to tile (3, 0).
    let ll = matrix.tile_extent(1, 2).unwrap();
    let ur = matrix.tile_extent(3, 0).unwrap();
    let span = BoundingBox::new(ll.min_x + 1.0, ll.min_y + 1.0, ur.max_x - 1.0, ur.max_y - 1.0);
    assert_eq!(matrix.limits_for_extent(&span), TileMatrixLimits::new("2", 0, 2, 1, 3));
}

#[test]
fn test_extent_outside_matrix_is_empty() {
    let set = regular_set(2);
    let matrix = set.matrix_at(2).unwrap();
    let east = BoundingBox::new(3e7, 0.0, 4e7, 1e6);
    assert_eq!(matrix.limits_for_extent(&east).tile_count(), 0);
}

// ============================================================================
// TileMatrixSet
// ============================================================================

#[test]
fn test_regular_set_has_22_levels() {
    let set = regular_set(21);
    assert_eq!(set.len(), 22);
    for z in 1..set.len() {
        let prev = set.matrix_at(z - 1).unwrap();
        let cur = set.matrix_at(z).unwrap();
        assert_eq!(cur.matrix_width(), prev.matrix_width() * 2);
        assert_eq!(cur.matrix_height(), prev.matrix_height() * 2);
        assert_eq!(cur.level(), z);
        assert_approx_eq!(cur.resolution() * 2.0, prev.resolution(), 1e-9);
    }
}

#[test]
fn test_limits_for_extent_per_level() {
    let set = regular_set(5);
    let world = set.bounding_box();
    let limits = set.limits_for_extent(&world, Some(1), Some(3)).unwrap();
    assert_eq!(limits.len(), 3);
    assert!(limits.get("0").is_none());
    assert_eq!(limits.get("3").unwrap().tile_count(), 64);
}

#[test]
fn test_tile_count_invariant() {
    let set = regular_set(6);
    let extent = BoundingBox::new(-5_000_000.0, -2_000_000.0, 3_000_000.0, 6_000_000.0);
    let limits = set.limits_for_extent(&extent, None, None).unwrap();

    let by_level: u64 = limits
        .levels()
        .filter(|l| {
            let z = set.zoom_level_of(&l.tile_matrix).unwrap();
            (2..=5).contains(&z)
        })
        .map(|l| {
            let rows = (l.max_tile_row - l.min_tile_row + 1) as u64;
            let cols = (l.max_tile_col - l.min_tile_col + 1) as u64;
            assert_eq!(l.tile_count(), rows * cols);
            l.tile_count()
        })
        .sum();

    assert_eq!(limits.tile_count_for(&set, Some(2), Some(5)).unwrap(), by_level);
}

#[test]
fn test_empty_limits_use_unrestricted_count() {
    let set = regular_set(3);
    let empty = TileMatrixSetLimits::new();
    assert_eq!(empty.tile_count_for(&set, Some(0), Some(2)).unwrap(), 21);
    assert_eq!(
        empty.tile_count_for(&set, None, None).unwrap(),
        set.total_tile_count(None, None).unwrap()
    );
}

#[test]
fn test_intersect_with_absent_returns_other() {
    let set = regular_set(3);
    let b = set
        .limits_for_extent(&BoundingBox::new(0.0, 0.0, 1e6, 1e6), None, None)
        .unwrap();
    let combined = TileMatrixSetLimits::intersect(None, Some(&b)).unwrap();
    assert_eq!(combined, b);
}

#[test]
fn test_sets_share_by_reference() {
    let set = Arc::new(regular_set(2));
    let other = Arc::clone(&set);
    assert_eq!(set.zoom_level_of_matrix(other.matrix_at(1).unwrap()), Some(1));
}
