//! Upstream map sources a layer is seeded from.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// An OGC WMS endpoint queried with GetMap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmsSource {
    pub identifier: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wgs84_extent: Option<BoundingBox>,
    pub url: String,
    pub version: String,
    pub layers: String,
    #[serde(default)]
    pub styles: String,
    /// Raw query fragment appended to every GetMap request, e.g. `transparent=true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_parameters: Option<String>,
    #[serde(default)]
    pub supported_formats: Vec<String>,
}

/// A WMTS endpoint addressed through a REST URL pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmtsSource {
    pub identifier: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wgs84_extent: Option<BoundingBox>,
    /// e.g. `http://host/etopo2/default/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png`
    pub url_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_matrix_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Bing Maps imagery. Recognized in configuration, not fetchable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingSource {
    pub identifier: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wgs84_extent: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagery_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Map source tagged by its `type` field: `"WMS"`, `"WMTS"` or `"Bing"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MapSource {
    #[serde(rename = "WMS")]
    Wms(WmsSource),
    #[serde(rename = "WMTS")]
    Wmts(WmtsSource),
    #[serde(rename = "Bing")]
    Bing(BingSource),
}

impl MapSource {
    pub fn identifier(&self) -> &str {
        match self {
            MapSource::Wms(s) => &s.identifier,
            MapSource::Wmts(s) => &s.identifier,
            MapSource::Bing(s) => &s.identifier,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MapSource::Wms(s) => &s.label,
            MapSource::Wmts(s) => &s.label,
            MapSource::Bing(s) => &s.label,
        }
    }

    pub fn wgs84_extent(&self) -> Option<BoundingBox> {
        match self {
            MapSource::Wms(s) => s.wgs84_extent,
            MapSource::Wmts(s) => s.wgs84_extent,
            MapSource::Bing(s) => s.wgs84_extent,
        }
    }

    /// The `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            MapSource::Wms(_) => "WMS",
            MapSource::Wmts(_) => "WMTS",
            MapSource::Bing(_) => "Bing",
        }
    }
}
