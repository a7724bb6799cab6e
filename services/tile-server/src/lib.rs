//! WMTS tile cache server.
//!
//! Seeds an on-disk tile cache from upstream WMS/WMTS sources and serves the
//! cached tiles through the WMTS REST and KVP bindings.

pub mod config;
pub mod download;
pub mod metrics;
pub mod seeding;
pub mod server;
pub mod state;
pub mod task;
pub mod wmts;

pub use config::Args;
pub use download::{HttpTileFetcher, RateLimiter, TileDownloader, TileFetcher};
pub use metrics::SeedMetrics;
pub use seeding::{SeedingBoundingBox, SeedingMode, SeedingRequest, SeedingService};
pub use server::create_router;
pub use state::{AppState, Catalog};
pub use task::{SeedingTask, TaskRegistry, TaskSummary, TileSummary};
pub use wmts::{get_tile_infos, TileInfo};
