//! Seeding tasks and the registry of active ones.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One tile to fetch: where from and where to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSummary {
    pub url: String,
    pub path: PathBuf,
    pub col: u32,
    pub row: u32,
    pub zoom: usize,
}

/// A materialized seeding plan and its progress.
///
/// `tiles_downloaded + tiles_in_error + remaining_tiles == tile_count` holds
/// at every observation.
#[derive(Debug)]
pub struct SeedingTask {
    id: u64,
    layer: String,
    cache: String,
    tiles: Vec<TileSummary>,
    tiles_downloaded: AtomicU64,
    tiles_in_error: AtomicU64,
    created_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl SeedingTask {
    pub fn new(id: u64, layer: impl Into<String>, cache: impl Into<String>, tiles: Vec<TileSummary>) -> Self {
        Self {
            id,
            layer: layer.into(),
            cache: cache.into(),
            tiles,
            tiles_downloaded: AtomicU64::new(0),
            tiles_in_error: AtomicU64::new(0),
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn cache(&self) -> &str {
        &self.cache
    }

    pub fn tiles(&self) -> &[TileSummary] {
        &self.tiles
    }

    pub fn tile_count(&self) -> u64 {
        self.tiles.len() as u64
    }

    pub fn tiles_downloaded(&self) -> u64 {
        self.tiles_downloaded.load(Ordering::SeqCst)
    }

    pub fn tiles_in_error(&self) -> u64 {
        self.tiles_in_error.load(Ordering::SeqCst)
    }

    pub fn remaining_tiles(&self) -> u64 {
        self.tile_count()
            .saturating_sub(self.tiles_downloaded() + self.tiles_in_error())
    }

    /// Percentage of attempted tiles. An empty task is complete.
    pub fn progress(&self) -> f64 {
        match self.tile_count() {
            0 => 100.0,
            total => (self.tiles_downloaded() + self.tiles_in_error()) as f64 / total as f64 * 100.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_tiles() == 0
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn record_downloaded(&self) {
        self.tiles_downloaded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self) {
        self.tiles_in_error.fetch_add(1, Ordering::SeqCst);
    }

    /// Stop dispatching tiles. Tiles not yet started are counted as errors.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn summary(&self) -> TaskSummary {
        let tiles_downloaded = self.tiles_downloaded();
        let tiles_in_error = self.tiles_in_error();
        let tile_count = self.tile_count();

        TaskSummary {
            id: self.id,
            layer: self.layer.clone(),
            cache: self.cache.clone(),
            tile_count,
            tiles_downloaded,
            tiles_in_error,
            remaining_tiles: tile_count.saturating_sub(tiles_downloaded + tiles_in_error),
            progress: self.progress(),
            created_at: self.created_at,
        }
    }
}

/// JSON view of a task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: u64,
    pub layer: String,
    pub cache: String,
    pub tile_count: u64,
    pub tiles_downloaded: u64,
    pub tiles_in_error: u64,
    pub remaining_tiles: u64,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
}

/// Active tasks by id. Finished tasks are removed.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<u64, Arc<SeedingTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: Arc<SeedingTask>) {
        self.tasks.lock().await.insert(task.id(), task);
    }

    pub async fn get(&self, id: u64) -> Option<Arc<SeedingTask>> {
        self.tasks.lock().await.get(&id).cloned()
    }

    /// Active tasks ordered by id.
    pub async fn list(&self) -> Vec<Arc<SeedingTask>> {
        let mut tasks: Vec<_> = self.tasks.lock().await.values().cloned().collect();
        tasks.sort_by_key(|t| t.id());
        tasks
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Called after every tile attempt. Removes `task` once it has no
    /// remaining tiles; returns true only for the call that removed it.
    pub async fn on_tile_complete(&self, task: &SeedingTask) -> bool {
        if !task.is_finished() {
            return false;
        }

        let removed = self.tasks.lock().await.remove(&task.id()).is_some();
        if removed {
            info!(
                task_id = task.id(),
                layer = %task.layer(),
                tiles_downloaded = task.tiles_downloaded(),
                tiles_in_error = task.tiles_in_error(),
                "Seeding task finished"
            );
        }
        removed
    }
}
