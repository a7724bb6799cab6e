//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::crs::AxisOrder;

/// A geographic or projected extent.
///
/// Serialized as `[minx, miny, maxx, maxy]`, the layout used by the JSON
/// configuration files (`wgs84Extent`, `boundingBox`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build from OGC lower/upper corner pairs.
    pub fn from_corners(lower: [f64; 2], upper: [f64; 2]) -> Self {
        Self::new(lower[0], lower[1], upper[0], upper[1])
    }

    pub fn lower_left(&self) -> (f64, f64) {
        (self.min_x, self.min_y)
    }

    pub fn upper_right(&self) -> (f64, f64) {
        (self.max_x, self.max_y)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Format as a KVP `bbox` value in the given axis order.
    ///
    /// North/east reference systems (EPSG:4326 under WMS 1.3.0) list the
    /// latitude first: `miny,minx,maxy,maxx`.
    pub fn to_kvp_string(&self, axis_order: AxisOrder) -> String {
        match axis_order {
            AxisOrder::EastNorth => format!(
                "{},{},{},{}",
                self.min_x, self.min_y, self.max_x, self.max_y
            ),
            AxisOrder::NorthEast => format!(
                "{},{},{},{}",
                self.min_y, self.min_x, self.max_y, self.max_x
            ),
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}
