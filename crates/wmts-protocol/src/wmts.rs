//! OGC WMTS protocol implementation.
//!
//! GetTile parsing for the KVP and RESTful bindings, and URL building for
//! upstream WMTS sources.

use serde::Deserialize;

use wmts_common::iteration::TileObject;
use wmts_common::{WmtsError, WmtsResult, WmtsSource};

/// GetTile request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTileRequest {
    /// Layer identifier
    pub layer: String,

    /// Style identifier
    pub style: String,

    /// Output format: a file extension (REST) or a MIME type (KVP)
    pub format: String,

    /// TileMatrixSet identifier
    pub tile_matrix_set: String,

    /// TileMatrix identifier
    pub tile_matrix: String,

    /// Tile row
    pub tile_row: u32,

    /// Tile column
    pub tile_col: u32,
}

/// KVP (Key-Value Pair) query string parameters for WMTS.
#[derive(Debug, Deserialize)]
pub struct WmtsKvpParams {
    #[serde(rename = "SERVICE")]
    pub service: Option<String>,

    #[serde(rename = "REQUEST")]
    pub request: Option<String>,

    #[serde(rename = "VERSION")]
    pub version: Option<String>,

    #[serde(rename = "LAYER")]
    pub layer: Option<String>,

    #[serde(rename = "STYLE")]
    pub style: Option<String>,

    #[serde(rename = "FORMAT")]
    pub format: Option<String>,

    #[serde(rename = "TILEMATRIXSET")]
    pub tile_matrix_set: Option<String>,

    #[serde(rename = "TILEMATRIX")]
    pub tile_matrix: Option<String>,

    #[serde(rename = "TILEROW")]
    pub tile_row: Option<u32>,

    #[serde(rename = "TILECOL")]
    pub tile_col: Option<u32>,
}

fn missing(param: &str) -> WmtsError {
    WmtsError::validation(param, "missing required parameter")
}

impl WmtsKvpParams {
    /// Parse into a GetTile request. Other operations are not served.
    pub fn into_get_tile(self) -> WmtsResult<GetTileRequest> {
        if !self
            .service
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("WMTS"))
        {
            return Err(WmtsError::validation("SERVICE", "SERVICE must be WMTS"));
        }

        match self.request.as_deref() {
            Some("GetTile") => Ok(GetTileRequest {
                layer: self.layer.ok_or_else(|| missing("LAYER"))?,
                style: self.style.unwrap_or_else(|| "default".to_string()),
                format: self.format.unwrap_or_else(|| "image/png".to_string()),
                tile_matrix_set: self
                    .tile_matrix_set
                    .ok_or_else(|| missing("TILEMATRIXSET"))?,
                tile_matrix: self.tile_matrix.ok_or_else(|| missing("TILEMATRIX"))?,
                tile_row: self.tile_row.ok_or_else(|| missing("TILEROW"))?,
                tile_col: self.tile_col.ok_or_else(|| missing("TILECOL"))?,
            }),
            Some("GetCapabilities") => Err(WmtsError::NotImplemented(
                "GetCapabilities".to_string(),
            )),
            Some(req) => Err(WmtsError::validation(
                "REQUEST",
                format!("Unknown request: {}", req),
            )),
            None => Err(missing("REQUEST")),
        }
    }
}

/// RESTful URL path parameters for WMTS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WmtsRestPath {
    pub layer: String,
    pub style: String,
    pub tile_matrix_set: String,
    pub tile_matrix: String,
    pub tile_row: u32,
    pub tile_col: u32,
    pub extension: String,
}

impl WmtsRestPath {
    /// Parse a RESTful WMTS URL path.
    ///
    /// Expected format: `/{layer}/{style}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.{ext}`
    pub fn parse(path: &str) -> WmtsResult<Self> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();

        if parts.len() != 6 {
            return Err(WmtsError::validation("path", "Invalid RESTful path format"));
        }

        let tile_row = parse_index(parts[4], "TileRow")?;
        let (tile_col, extension) = Self::split_file_name(parts[5])?;

        Ok(Self {
            layer: parts[0].to_string(),
            style: parts[1].to_string(),
            tile_matrix_set: parts[2].to_string(),
            tile_matrix: parts[3].to_string(),
            tile_row,
            tile_col,
            extension,
        })
    }

    /// Split the final `{TileCol}.{ext}` segment.
    pub fn split_file_name(file_name: &str) -> WmtsResult<(u32, String)> {
        let (col, extension) = file_name
            .rsplit_once('.')
            .ok_or_else(|| WmtsError::validation("TileCol", "Missing format extension"))?;
        if extension.is_empty() {
            return Err(WmtsError::validation("TileCol", "Missing format extension"));
        }
        Ok((parse_index(col, "TileCol")?, extension.to_string()))
    }

    /// Convert to GetTileRequest.
    pub fn into_request(self) -> GetTileRequest {
        GetTileRequest {
            layer: self.layer,
            style: self.style,
            format: self.extension,
            tile_matrix_set: self.tile_matrix_set,
            tile_matrix: self.tile_matrix,
            tile_row: self.tile_row,
            tile_col: self.tile_col,
        }
    }
}

fn parse_index(value: &str, param: &str) -> WmtsResult<u32> {
    value
        .parse()
        .map_err(|_| WmtsError::validation(param, format!("Invalid tile index '{}'", value)))
}

/// Fills the placeholders of a WMTS source URL pattern.
#[derive(Debug, Clone)]
pub struct WmtsUrlBuilder {
    url_pattern: String,
}

impl WmtsUrlBuilder {
    pub fn new(source: &WmtsSource) -> WmtsResult<Self> {
        if source.url_pattern.trim().is_empty() {
            return Err(WmtsError::validation("urlPattern", "cannot be empty"));
        }
        Ok(Self {
            url_pattern: source.url_pattern.clone(),
        })
    }

    /// Substitutes `{TileMatrixSet}`, `{TileMatrix}`, `{TileCol}`, `{TileRow}`
    /// and `{ZoomLevel}`.
    pub fn request_url(&self, tile: &TileObject<'_>) -> String {
        self.url_pattern
            .replace("{TileMatrixSet}", tile.grid_set_id())
            .replace("{TileMatrix}", tile.tile_matrix.identifier())
            .replace("{TileCol}", &tile.col.to_string())
            .replace("{TileRow}", &tile.row.to_string())
            .replace("{ZoomLevel}", &tile.zoom.to_string())
    }
}
