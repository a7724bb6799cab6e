//! Seeding metrics.
//!
//! Counters are published through the `metrics` facade (picked up by the
//! Prometheus recorder installed in `main`) and mirrored in atomics so the
//! `/metrics` endpoint still has something to render without a recorder.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

#[derive(Debug, Default)]
pub struct SeedMetrics {
    tiles_downloaded: AtomicU64,
    tiles_failed: AtomicU64,
    tasks_created: AtomicU64,
}

impl SeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tile_downloaded(&self) {
        self.tiles_downloaded.fetch_add(1, Ordering::Relaxed);
        counter!("seed_tiles_downloaded_total").increment(1);
    }

    pub fn record_tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
        counter!("seed_tiles_failed_total").increment(1);
    }

    pub fn record_task_created(&self) {
        self.tasks_created.fetch_add(1, Ordering::Relaxed);
        counter!("seed_tasks_created_total").increment(1);
    }

    pub fn tiles_downloaded(&self) -> u64 {
        self.tiles_downloaded.load(Ordering::Relaxed)
    }

    pub fn tiles_failed(&self) -> u64 {
        self.tiles_failed.load(Ordering::Relaxed)
    }

    pub fn tasks_created(&self) -> u64 {
        self.tasks_created.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition of the mirrored counters.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for (name, help, value) in [
            (
                "seed_tiles_downloaded_total",
                "Tiles fetched and stored by seeding tasks",
                self.tiles_downloaded(),
            ),
            (
                "seed_tiles_failed_total",
                "Tiles that could not be fetched or stored",
                self.tiles_failed(),
            ),
            (
                "seed_tasks_created_total",
                "Seeding tasks accepted",
                self.tasks_created(),
            ),
        ] {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }
        output
    }
}
