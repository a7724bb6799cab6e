//! Upstream URL building against real layer definitions.

use std::collections::HashMap;
use std::sync::Arc;

use test_utils::{assert_approx_eq, BING_SOURCE, OSM_LAYER, WEB_MERCATOR_QUAD, WMS_SOURCE, WMTS_SOURCE};
use wmts_common::layer::{LayerOptions, TileMatrixSetLookup};
use wmts_common::tile::{build_regular_tile_matrix_set, TileMatrixOptions, TileMatrixSetOptions};
use wmts_common::{
    LayerDefinition, MapSource, MimeTypeRegistry, SrsRegistry, TileIterationRequest, TileMatrixSet,
    WmtsError,
};
use wmts_protocol::UrlBuilder;

fn sets() -> HashMap<String, Arc<TileMatrixSet>> {
    let options: TileMatrixSetOptions = serde_json::from_str(WEB_MERCATOR_QUAD).unwrap();
    let quad = TileMatrixSet::from_options(&options, &SrsRegistry::builtin()).unwrap();

    let wgs84 = SrsRegistry::global().require("EPSG:4326").unwrap();
    let level0 = TileMatrixOptions {
        identifier: "0".to_string(),
        scale_denominator: 279541132.0143589,
        top_left_corner: [-180.0, 90.0],
        tile_width: 256,
        tile_height: 256,
        matrix_width: 2,
        matrix_height: 1,
    };
    let crs84 = build_regular_tile_matrix_set("WorldCRS84Quad", wgs84, None, &level0, 2, None).unwrap();

    let mut sets = HashMap::new();
    sets.insert("webmercatorquad".to_string(), Arc::new(quad));
    sets.insert("worldcrs84quad".to_string(), Arc::new(crs84));
    sets
}

fn layer(tile_matrix_set: &str) -> LayerDefinition {
    let mut options: LayerOptions = serde_json::from_str(OSM_LAYER).unwrap();
    options.caches[0].tile_matrix_set = tile_matrix_set.to_string();
    let sets = sets();
    let lookup: &dyn TileMatrixSetLookup = &sets;
    LayerDefinition::from_options(&options, lookup, &MimeTypeRegistry::default()).unwrap()
}

fn urls(layer: &LayerDefinition, source: &str, zoom: usize) -> Vec<String> {
    let source: MapSource = serde_json::from_str(source).unwrap();
    let builder = UrlBuilder::for_source(&source).unwrap();
    let cache = &layer.caches()[0];
    let request = TileIterationRequest::new(layer, cache, zoom, zoom, None).unwrap();
    layer
        .iterate_tiles(&request)
        .map(|t| builder.request_url(&t).unwrap())
        .collect()
}

fn query_value<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn bbox(url: &str) -> Vec<f64> {
    query_value(url, "bbox")
        .unwrap()
        .split(',')
        .map(|v| v.parse().unwrap())
        .collect()
}

// ============================================================================
// WMTS sources
// ============================================================================

#[test]
fn test_wmts_pattern_substitution() {
    let layer = layer("WebMercatorQuad");
    let urls = urls(&layer, WMTS_SOURCE, 1);
    assert_eq!(
        urls,
        vec![
            "http://upstream.test/wmts/WebMercatorQuad/1/0/0.png",
            "http://upstream.test/wmts/WebMercatorQuad/1/0/1.png",
            "http://upstream.test/wmts/WebMercatorQuad/1/1/0.png",
            "http://upstream.test/wmts/WebMercatorQuad/1/1/1.png",
        ]
    );
}

#[test]
fn test_wmts_zoom_level_placeholder() {
    let layer = layer("WebMercatorQuad");
    let source = r#"{"identifier":"xyz","type":"WMTS","urlPattern":"http://t.test/{ZoomLevel}/{TileCol}/{TileRow}.png"}"#;
    let urls = urls(&layer, source, 2);
    assert_eq!(urls.len(), 16);
    assert_eq!(urls[5], "http://t.test/2/1/1.png");
}

// ============================================================================
// WMS sources
// ============================================================================

#[test]
fn test_wms_get_map_projected() {
    let layer = layer("WebMercatorQuad");
    let urls = urls(&layer, WMS_SOURCE, 1);
    let url = &urls[0];

    assert!(url.starts_with("http://upstream.test/wms?service=WMS&version=1.3.0&request=GetMap"));
    assert_eq!(query_value(url, "layers"), Some("OSM-WMS"));
    assert_eq!(query_value(url, "styles"), Some(""));
    assert_eq!(query_value(url, "crs"), Some("urn:ogc:def:crs:EPSG::3857"));
    assert_eq!(query_value(url, "format"), Some("image/png"));
    assert_eq!(query_value(url, "width"), Some("256"));
    assert_eq!(query_value(url, "height"), Some("256"));

    // Tile (0, 0) of level 1 is the north-west quadrant, east/north order.
    let b = bbox(url);
    assert_approx_eq!(b[0], -20037508.3427892, 1e-3);
    assert_approx_eq!(b[1], 0.0, 1e-3);
    assert_approx_eq!(b[2], 0.0, 1e-3);
    assert_approx_eq!(b[3], 20037508.3427892, 1e-3);
}

#[test]
fn test_wms_axis_order_swapped_for_geographic() {
    let layer = layer("WorldCRS84Quad");
    let urls = urls(&layer, WMS_SOURCE, 0);
    assert_eq!(urls.len(), 2);

    // Tile (0, 0) covers lon -180..0, lat -90..90; listed lat first.
    let b = bbox(&urls[0]);
    assert_approx_eq!(b[0], -90.0, 1e-6);
    assert_approx_eq!(b[1], -180.0, 1e-6);
    assert_approx_eq!(b[2], 90.0, 1e-6);
    assert_approx_eq!(b[3], 0.0, 1e-6);
    assert_eq!(query_value(&urls[0], "crs"), Some("epsg:4326"));
}

#[test]
fn test_wms_1_1_keeps_geographic_axis_order() {
    let layer = layer("WorldCRS84Quad");
    let source = r#"{
        "identifier": "legacy", "type": "WMS", "url": "http://legacy.test/wms",
        "version": "1.1.1", "layers": "base"
    }"#;
    let urls = urls(&layer, source, 0);

    // Same tile as above, but 1.1.1 always lists longitude first.
    let b = bbox(&urls[0]);
    assert_approx_eq!(b[0], -180.0, 1e-6);
    assert_approx_eq!(b[1], -90.0, 1e-6);
    assert_approx_eq!(b[2], 0.0, 1e-6);
    assert_approx_eq!(b[3], 90.0, 1e-6);
    assert!(urls[0].contains("&version=1.1.1&"));
}

#[test]
fn test_wms_1_0_uses_srs_key_and_extra_parameters() {
    let layer = layer("WebMercatorQuad");
    let source = r#"{
        "identifier": "old", "type": "WMS", "url": "http://old.test/wms",
        "version": "1.0.0", "layers": "base", "additionalParameters": "&transparent=true"
    }"#;
    let urls = urls(&layer, source, 0);
    assert!(query_value(&urls[0], "srs").is_some());
    assert!(query_value(&urls[0], "crs").is_none());
    assert!(urls[0].ends_with("&height=256&transparent=true"));
}

#[test]
fn test_wms_unsupported_version() {
    let source = r#"{"identifier":"x","type":"WMS","url":"http://x","version":"2.0","layers":"a"}"#;
    let source: MapSource = serde_json::from_str(source).unwrap();
    assert!(matches!(
        UrlBuilder::for_source(&source),
        Err(WmtsError::Validation { .. })
    ));
}

// ============================================================================
// Bing sources
// ============================================================================

#[test]
fn test_bing_not_implemented() {
    let source: MapSource = serde_json::from_str(BING_SOURCE).unwrap();
    assert!(matches!(
        UrlBuilder::for_source(&source),
        Err(WmtsError::NotImplemented(_))
    ));
}
