//! Extent conversion between reference systems.

use crate::bbox::BoundingBox;
use crate::crs::SpatialReference;
use crate::error::{WmtsError, WmtsResult};

const EARTH_RADIUS: f64 = 6378137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Converts an extent from one reference system into another.
pub trait CoordinateTransform: Send + Sync {
    fn transform_extent(
        &self,
        extent: &BoundingBox,
        from: &SpatialReference,
        to: &SpatialReference,
    ) -> WmtsResult<BoundingBox>;
}

/// Handles identity plus WGS84 <-> Web Mercator.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorTransform;

impl WebMercatorTransform {
    fn is_wgs84(srs: &SpatialReference) -> bool {
        srs.matches("epsg:4326")
    }

    fn is_web_mercator(srs: &SpatialReference) -> bool {
        srs.matches("epsg:3857")
    }
}

impl CoordinateTransform for WebMercatorTransform {
    fn transform_extent(
        &self,
        extent: &BoundingBox,
        from: &SpatialReference,
        to: &SpatialReference,
    ) -> WmtsResult<BoundingBox> {
        if from == to {
            return Ok(*extent);
        }

        if Self::is_wgs84(from) && Self::is_web_mercator(to) {
            let (min_x, min_y) = wgs84_to_mercator(extent.min_x, extent.min_y);
            let (max_x, max_y) = wgs84_to_mercator(extent.max_x, extent.max_y);
            return Ok(BoundingBox::new(min_x, min_y, max_x, max_y));
        }

        if Self::is_web_mercator(from) && Self::is_wgs84(to) {
            let (min_x, min_y) = mercator_to_wgs84(extent.min_x, extent.min_y);
            let (max_x, max_y) = mercator_to_wgs84(extent.max_x, extent.max_y);
            return Ok(BoundingBox::new(min_x, min_y, max_x, max_y));
        }

        Err(WmtsError::NotImplemented(format!(
            "transform from {} to {}",
            from.identifier(),
            to.identifier()
        )))
    }
}

/// Convert lon/lat degrees to Web Mercator meters. Latitude is clamped to the
/// Mercator limit.
pub fn wgs84_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * lat.to_radians().tan().asinh();
    (x, y)
}

/// Convert Web Mercator meters to lon/lat degrees.
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (y / EARTH_RADIUS).sinh().atan().to_degrees();
    (lon, lat)
}
