//! Spatial reference systems known to the tile cache.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{WmtsError, WmtsResult};

/// Meters per degree on the WGS84 equator.
pub const METERS_PER_DEGREE: f64 = 6378137.0 * 2.0 * std::f64::consts::PI / 360.0;

/// Axis order for coordinate interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AxisOrder {
    /// X (longitude/easting), Y (latitude/northing)
    EastNorth,
    /// Y (latitude/northing), X (longitude/easting)
    NorthEast,
}

/// A coordinate reference system and its aliases.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    identifiers: Vec<String>,
    meters_per_unit: f64,
    axis_order: AxisOrder,
}

impl SpatialReference {
    pub fn new<I, S>(identifiers: I, meters_per_unit: f64, axis_order: AxisOrder) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
            meters_per_unit,
            axis_order,
        }
    }

    /// Primary identifier (first alias).
    pub fn identifier(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or_default()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn meters_per_unit(&self) -> f64 {
        self.meters_per_unit
    }

    pub fn axis_order(&self) -> AxisOrder {
        self.axis_order
    }

    /// Case-insensitive alias check.
    pub fn matches(&self, identifier: &str) -> bool {
        self.identifiers
            .iter()
            .any(|id| id.eq_ignore_ascii_case(identifier))
    }
}

/// Alias lookup table for spatial references.
#[derive(Debug, Clone, Default)]
pub struct SrsRegistry {
    references: Vec<Arc<SpatialReference>>,
    by_alias: HashMap<String, usize>,
}

impl SrsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the reference systems the server supports.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SpatialReference::new(
            ["epsg:4326", "urn:ogc:def:crs:epsg::4326"],
            METERS_PER_DEGREE,
            AxisOrder::NorthEast,
        ));
        registry.register(SpatialReference::new(
            [
                "epsg:3857",
                "urn:ogc:def:crs:epsg::3857",
                "epsg:900913",
                "urn:ogc:def:crs:epsg::900913",
            ],
            1.0,
            AxisOrder::EastNorth,
        ));
        registry.register(SpatialReference::new(
            ["epsg:32642", "urn:ogc:def:crs:epsg::32642"],
            1.0,
            AxisOrder::EastNorth,
        ));
        registry
    }

    /// Process-wide builtin registry.
    pub fn global() -> &'static SrsRegistry {
        static GLOBAL: OnceLock<SrsRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SrsRegistry::builtin)
    }

    /// Register a reference system. Aliases already taken keep their first owner.
    pub fn register(&mut self, reference: SpatialReference) {
        let index = self.references.len();
        for alias in reference.identifiers() {
            self.by_alias.entry(alias.to_lowercase()).or_insert(index);
        }
        self.references.push(Arc::new(reference));
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<SpatialReference>> {
        self.by_alias
            .get(&identifier.to_lowercase())
            .and_then(|&i| self.references.get(i))
    }

    /// Like [`get`](Self::get) but fails with NotFound.
    pub fn require(&self, identifier: &str) -> WmtsResult<&Arc<SpatialReference>> {
        self.get(identifier)
            .ok_or_else(|| WmtsError::not_found("Spatial reference", identifier))
    }

    pub fn list(&self) -> &[Arc<SpatialReference>] {
        &self.references
    }
}
