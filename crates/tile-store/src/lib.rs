//! Storage side of the WMTS tile cache.
//!
//! - [`path`]: where tiles live on disk, and the sanitization guarding it
//! - [`config`]: the `server.json` options file
//! - [`repository`] and [`layers`]: JSON document directories for map
//!   sources, tile matrix sets and layer definitions

pub mod config;
pub mod layers;
pub mod path;
pub mod repository;

pub use config::ServerOptions;
pub use layers::LayerRepository;
pub use path::{sanitize_path, FilePathGenerator, TilePathGenerator, XyzTilePathGenerator};
pub use repository::{parse_map_source, MapSourceRepository, TileMatrixSetRepository};
