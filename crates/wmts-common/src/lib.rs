//! Common types shared across the WMTS tile cache crates.
//!
//! Holds the OGC tile matrix model, the limits algebra used to restrict
//! a tile matrix set, the layer/cache configuration model and the tile
//! enumerator that drives seeding.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod iteration;
pub mod layer;
pub mod limits;
pub mod mime;
pub mod source;
pub mod tile;
pub mod transform;

pub use bbox::BoundingBox;
pub use crs::{AxisOrder, SpatialReference, SrsRegistry};
pub use error::{WmtsError, WmtsResult};
pub use iteration::{TileIter, TileIterationRequest, TileObject};
pub use layer::{
    CacheOptions, FilePathScheme, LayerCache, LayerCreationRequest, LayerDefinition,
    LayerOptions, ResourceUrl, TileMatrixSetLookup,
};
pub use limits::{TileMatrixLimits, TileMatrixSetLimits};
pub use mime::{MimeType, MimeTypeRegistry};
pub use source::{BingSource, MapSource, WmsSource, WmtsSource};
pub use tile::{
    build_regular_tile_matrix_set, TileMatrix, TileMatrixOptions, TileMatrixSet,
    TileMatrixSetOptions,
};
pub use transform::{CoordinateTransform, WebMercatorTransform};
