//! Configuration fixtures for tile cache tests.
//!
//! [`ConfigFixture`] writes a complete server configuration into a temporary
//! directory:
//!
//! ```text
//! <tmp>/server.json
//! <tmp>/cache/
//! <tmp>/mapSources/{osm-wms,osm-wmts,bing}.json
//! <tmp>/tileMatrixSets/WebMercatorQuad.json
//! <tmp>/layers/osm.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Web Mercator quad limited to levels 0..=3 (1, 4, 16 and 64 tiles).
pub const WEB_MERCATOR_QUAD: &str = r#"{
    "identifier": "WebMercatorQuad",
    "title": "Google Maps Compatible",
    "supportedCRS": "urn:ogc:def:crs:EPSG::3857",
    "wellKnownScaleSet": "http://www.opengis.net/def/wkss/OGC/1.0/GoogleMapsCompatible",
    "tileMatrix": [
        { "identifier": "0", "scaleDenominator": 559082264.0287178, "topLeftCorner": [-20037508.3427892, 20037508.3427892], "tileWidth": 256, "tileHeight": 256, "matrixWidth": 1, "matrixHeight": 1 },
        { "identifier": "1", "scaleDenominator": 279541132.0143589, "topLeftCorner": [-20037508.3427892, 20037508.3427892], "tileWidth": 256, "tileHeight": 256, "matrixWidth": 2, "matrixHeight": 2 },
        { "identifier": "2", "scaleDenominator": 139770566.0071794, "topLeftCorner": [-20037508.3427892, 20037508.3427892], "tileWidth": 256, "tileHeight": 256, "matrixWidth": 4, "matrixHeight": 4 },
        { "identifier": "3", "scaleDenominator": 69885283.00358972, "topLeftCorner": [-20037508.3427892, 20037508.3427892], "tileWidth": 256, "tileHeight": 256, "matrixWidth": 8, "matrixHeight": 8 }
    ]
}"#;

pub const WMS_SOURCE: &str = r#"{
    "identifier": "osm-wms",
    "label": "OpenStreetMap WMS",
    "type": "WMS",
    "url": "http://upstream.test/wms",
    "version": "1.3.0",
    "layers": "OSM-WMS",
    "styles": "",
    "supportedFormats": ["image/png"],
    "wgs84Extent": [-180, -85, 180, 85]
}"#;

pub const WMTS_SOURCE: &str = r#"{
    "identifier": "osm-wmts",
    "label": "OpenStreetMap WMTS",
    "type": "WMTS",
    "urlPattern": "http://upstream.test/wmts/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png",
    "tileMatrixSet": "WebMercatorQuad",
    "format": "image/png"
}"#;

pub const BING_SOURCE: &str = r#"{
    "identifier": "bing",
    "type": "Bing",
    "imageryType": "Aerial",
    "format": "image/jpeg"
}"#;

pub const OSM_LAYER: &str = r#"{
    "identifier": "osm",
    "label": "OpenStreetMap",
    "mapSource": "osm-wmts",
    "filePathScheme": "xyz",
    "caches": [
        { "identifier": "osm-3857", "tileMatrixSet": "WebMercatorQuad", "style": "default", "format": "image/png" }
    ]
}"#;

/// A temporary configuration tree. Removed on drop.
pub struct ConfigFixture {
    dir: TempDir,
}

impl ConfigFixture {
    /// Write `server.json` and the default documents.
    pub fn new() -> Self {
        let fixture = Self::empty();
        fixture.write_tile_matrix_set("WebMercatorQuad", WEB_MERCATOR_QUAD);
        fixture.write_map_source("osm-wms", WMS_SOURCE);
        fixture.write_map_source("osm-wmts", WMTS_SOURCE);
        fixture.write_map_source("bing", BING_SOURCE);
        fixture.write_layer("osm", OSM_LAYER);
        fixture
    }

    /// Directories and `server.json` only.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        for sub in ["cache", "mapSources", "tileMatrixSets", "layers"] {
            fs::create_dir_all(dir.path().join(sub)).expect("create fixture dir");
        }

        let server = serde_json::json!({
            "cacheRoot": "cache",
            "mapSourcesPath": "mapSources",
            "tileMatrixSetsPath": "tileMatrixSets",
            "layersPath": "layers",
            "mimeTypes": [
                { "internalName": "webp", "type": "image/webp", "fileExtension": "webp" }
            ]
        });
        fs::write(
            dir.path().join("server.json"),
            serde_json::to_string_pretty(&server).expect("serialize server.json"),
        )
        .expect("write server.json");

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("server.json")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root().join("cache")
    }

    pub fn layers_dir(&self) -> PathBuf {
        self.root().join("layers")
    }

    pub fn write_map_source(&self, name: &str, json: &str) -> PathBuf {
        self.write(&format!("mapSources/{}.json", name), json)
    }

    pub fn write_tile_matrix_set(&self, name: &str, json: &str) -> PathBuf {
        self.write(&format!("tileMatrixSets/{}.json", name), json)
    }

    pub fn write_layer(&self, name: &str, json: &str) -> PathBuf {
        self.write(&format!("layers/{}.json", name), json)
    }

    /// Write `contents` at `relative` under the fixture root.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture parent");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }
}

impl Default for ConfigFixture {
    fn default() -> Self {
        Self::new()
    }
}
