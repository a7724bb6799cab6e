//! OGC protocol bindings for the tile cache.
//!
//! Supports:
//! - WMTS 1.0.0 GetTile requests (KVP and RESTful bindings)
//! - Upstream tile URLs for WMTS (REST pattern) and WMS (GetMap KVP) sources

pub mod url;
pub mod wms;
pub mod wmts;

pub use url::UrlBuilder;
pub use wms::WmsUrlBuilder;
pub use wmts::{GetTileRequest, WmtsKvpParams, WmtsRestPath, WmtsUrlBuilder};
