//! Tile download pipeline.
//!
//! - [`TileFetcher`]: fetches one URL into one file ([`HttpTileFetcher`] in
//!   production, fakes in tests)
//! - [`RateLimiter`]: process-wide spacing between upstream requests
//! - [`TileDownloader`]: runs every tile of a task concurrently and keeps the
//!   task counters and the registry up to date

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use wmts_common::{WmtsError, WmtsResult};

use crate::metrics::SeedMetrics;
use crate::task::{SeedingTask, TaskRegistry, TileSummary};

/// Fetches one tile into `destination`, returning the number of bytes
/// written. The parent directory already exists.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path) -> WmtsResult<u64>;
}

/// HTTP fetcher streaming response bodies to disk.
pub struct HttpTileFetcher {
    client: Client,
}

impl HttpTileFetcher {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> WmtsResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WmtsError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unspecified");
            warn!(url = %url, retry_after = %retry_after, "Upstream is throttling requests");
        }
        if !status.is_success() {
            return Err(WmtsError::Transport(format!("GET {} returned {}", url, status)));
        }

        let mut file = fs::File::create(destination).await.map_err(|e| {
            WmtsError::Io(format!("Failed to create {}: {}", destination.display(), e))
        })?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        let streamed = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk
                    .map_err(|e| WmtsError::Transport(format!("Error reading {}: {}", url, e)))?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), WmtsError>(())
        }
        .await;

        if let Err(e) = streamed {
            drop(file);
            fs::remove_file(destination).await.ok();
            return Err(e);
        }

        Ok(written)
    }
}

/// Enforces a minimum interval between consecutive dispatches.
///
/// One cursor is shared by every caller: each acquisition reserves the next
/// free slot under the lock, then sleeps outside it.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_allowed: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: Mutex::new(Instant::now()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until this caller's slot comes up.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_allowed.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Runs seeding tasks.
pub struct TileDownloader {
    fetcher: Arc<dyn TileFetcher>,
    limiter: Arc<RateLimiter>,
    registry: Arc<TaskRegistry>,
    metrics: Arc<SeedMetrics>,
}

impl TileDownloader {
    pub fn new(
        fetcher: Arc<dyn TileFetcher>,
        limiter: Arc<RateLimiter>,
        registry: Arc<TaskRegistry>,
        metrics: Arc<SeedMetrics>,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            registry,
            metrics,
        }
    }

    /// Attempt every tile of `task` concurrently. Returns once each tile has
    /// either been stored or counted as an error.
    pub async fn process_task(&self, task: Arc<SeedingTask>) {
        debug!(task_id = task.id(), tiles = task.tile_count(), "Processing seeding task");

        if task.tiles().is_empty() {
            self.registry.on_tile_complete(&task).await;
            return;
        }

        join_all(task.tiles().iter().map(|tile| self.process_tile(&task, tile))).await;
    }

    async fn process_tile(&self, task: &SeedingTask, tile: &TileSummary) {
        let dispatched = tokio::select! {
            biased;
            _ = task.cancellation_token().cancelled() => false,
            _ = self.limiter.acquire() => !task.is_cancelled(),
        };

        let result = if dispatched {
            self.download_tile(task, tile).await
        } else {
            Err(WmtsError::Transport("task cancelled".to_string()))
        };

        match result {
            Ok(()) => {
                task.record_downloaded();
                self.metrics.record_tile_downloaded();
            }
            Err(e) => {
                if dispatched {
                    warn!(task_id = task.id(), url = %tile.url, error = %e, "Tile download failed");
                }
                task.record_error();
                self.metrics.record_tile_failed();
            }
        }

        self.registry.on_tile_complete(task).await;
    }

    #[instrument(skip(self, task, tile), fields(task_id = task.id(), url = %tile.url))]
    async fn download_tile(&self, task: &SeedingTask, tile: &TileSummary) -> WmtsResult<()> {
        if let Some(parent) = tile.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                WmtsError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let bytes = self.fetcher.fetch(&tile.url, &tile.path).await?;
        debug!(path = %tile.path.display(), bytes, "Stored tile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_dispatches() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for h in handles {
            times.push(h.await.unwrap() - start);
        }
        times.sort();

        assert_eq!(times[0], Duration::ZERO);
        assert_eq!(times[3], Duration::from_millis(150));
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_wait() {
        let limiter = RateLimiter::new(Duration::ZERO);
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.interval(), Duration::ZERO);
    }
}
