//! Upstream URL building dispatched on the map source type.

use wmts_common::iteration::TileObject;
use wmts_common::{MapSource, WmtsError, WmtsResult};

use crate::wms::WmsUrlBuilder;
use crate::wmts::WmtsUrlBuilder;

/// One builder per map source type.
#[derive(Debug, Clone)]
pub enum UrlBuilder {
    Wmts(WmtsUrlBuilder),
    Wms(WmsUrlBuilder),
}

impl UrlBuilder {
    /// Bing sources are recognized but have no URL scheme and fail with
    /// NotImplemented.
    pub fn for_source(source: &MapSource) -> WmtsResult<Self> {
        match source {
            MapSource::Wmts(s) => Ok(UrlBuilder::Wmts(WmtsUrlBuilder::new(s)?)),
            MapSource::Wms(s) => Ok(UrlBuilder::Wms(WmsUrlBuilder::new(s)?)),
            MapSource::Bing(s) => Err(WmtsError::NotImplemented(format!(
                "Bing map source '{}'",
                s.identifier
            ))),
        }
    }

    pub fn request_url(&self, tile: &TileObject<'_>) -> WmtsResult<String> {
        match self {
            UrlBuilder::Wmts(b) => Ok(b.request_url(tile)),
            UrlBuilder::Wms(b) => b.request_url(tile),
        }
    }
}
