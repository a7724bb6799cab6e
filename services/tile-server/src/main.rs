//! Tile server binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use tile_server::{create_router, AppState, Args, Catalog, HttpTileFetcher, RateLimiter};
use tile_store::ServerOptions;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level())
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed, serving fallback counters");
            None
        }
    };

    info!(config = %args.config.display(), "Starting tile server");

    let options = ServerOptions::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let catalog = Catalog::load(options).context("Invalid server configuration")?;

    let fetcher = HttpTileFetcher::new(args.request_timeout())?;
    let limiter = RateLimiter::new(args.rate_limit());
    info!(
        rate_limit_ms = args.rate_limit_ms,
        request_timeout_secs = args.request_timeout_secs,
        "Seeding pipeline ready"
    );

    let state = Arc::new(AppState::new(
        Arc::new(catalog),
        Arc::new(fetcher),
        Arc::new(limiter),
        prometheus,
    ));
    let app = create_router(state);

    info!(address = %args.listen, "Listening");
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    axum::serve(listener, app).await?;

    Ok(())
}
