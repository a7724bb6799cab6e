//! GetMap URLs for upstream WMS sources.

use wmts_common::iteration::TileObject;
use wmts_common::{AxisOrder, WmsSource, WmtsError, WmtsResult};

/// Builds one KVP GetMap request per tile.
#[derive(Debug, Clone)]
pub struct WmsUrlBuilder {
    source: WmsSource,
    srs_key: &'static str,
}

impl WmsUrlBuilder {
    /// Fails with Validation for a WMS version other than 1.0.0, 1.1.0,
    /// 1.1.1 or 1.3.0.
    pub fn new(source: &WmsSource) -> WmtsResult<Self> {
        if source.url.trim().is_empty() {
            return Err(WmtsError::validation("url", "cannot be empty"));
        }

        Ok(Self {
            srs_key: srs_key(&source.version)?,
            source: source.clone(),
        })
    }

    /// `{url}?service=WMS&version=..&request=GetMap&layers=..&styles=..&{srs|crs}=..&bbox=..&format=..&width=..&height=..`
    /// followed by the source's additional parameters.
    ///
    /// The bbox lists latitude first only for WMS 1.3.0 with a north/east
    /// ordered reference system; older versions are always east/north.
    pub fn request_url(&self, tile: &TileObject<'_>) -> WmtsResult<String> {
        let extent = tile.tile_matrix.tile_extent(tile.col, tile.row)?;
        let axis_order = bbox_axis_order(
            &self.source.version,
            tile.tile_matrix_set.spatial_reference().axis_order(),
        );

        let mut url = format!(
            "{}?service=WMS&version={}&request=GetMap&layers={}&styles={}&{}={}&bbox={}&format={}&width={}&height={}",
            self.source.url,
            self.source.version,
            self.source.layers,
            self.source.styles,
            self.srs_key,
            tile.tile_matrix_set.crs(),
            extent.to_kvp_string(axis_order),
            tile.mime_type.mime_type,
            tile.tile_matrix.tile_width(),
            tile.tile_matrix.tile_height(),
        );

        if let Some(extra) = self
            .source
            .additional_parameters
            .as_deref()
            .map(|p| p.trim_start_matches(['&', '?']))
            .filter(|p| !p.is_empty())
        {
            url.push('&');
            url.push_str(extra);
        }

        Ok(url)
    }
}

/// Axis order of the GetMap bbox. Only WMS 1.3.0 honours the reference
/// system's declared order.
pub fn bbox_axis_order(version: &str, declared: AxisOrder) -> AxisOrder {
    match version {
        "1.3.0" => declared,
        _ => AxisOrder::EastNorth,
    }
}

/// Query key naming the reference system for a WMS version.
pub fn srs_key(version: &str) -> WmtsResult<&'static str> {
    match version {
        "1.0.0" => Ok("srs"),
        "1.1.0" | "1.1.1" | "1.3.0" => Ok("crs"),
        other => Err(WmtsError::validation(
            "version",
            format!("Unsupported WMS version '{}'", other),
        )),
    }
}
