//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

#[derive(Parser, Debug, Clone)]
#[command(name = "tile-server")]
#[command(about = "WMTS tile cache server with upstream seeding")]
pub struct Args {
    /// Server options file (server.json)
    #[arg(long, env = "TILE_SERVER_CONFIG", default_value = "config/server.json")]
    pub config: PathBuf,

    /// Address the HTTP API listens on
    #[arg(long, env = "TILE_SERVER_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Minimum spacing between two upstream requests, across all tasks
    #[arg(long, env = "SEED_RATE_LIMIT_MS", default_value = "50")]
    pub rate_limit_ms: u64,

    /// Timeout of one upstream tile request
    #[arg(long, env = "SEED_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,
}

impl Args {
    /// Unknown names fall back to INFO.
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
