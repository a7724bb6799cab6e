//! Configuration repositories backed by directories of JSON documents.
//!
//! Each repository reads every `*.json` file of its directory once at
//! startup. A document that fails to parse or validate is logged and
//! skipped; a missing directory is an error. Identifiers are looked up case
//! insensitively.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use wmts_common::{
    MapSource, SrsRegistry, TileMatrixSet, TileMatrixSetLookup, TileMatrixSetOptions, WmtsError,
    WmtsResult,
};

/// Map source types the server knows about.
pub const MAP_SOURCE_TYPES: &[&str] = &["WMS", "WMTS", "Bing"];

/// Paths of the JSON documents in `dir`, sorted by file name.
pub(crate) fn json_documents(dir: &Path) -> WmtsResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(WmtsError::validation(
            "path",
            format!("directory '{}' does not exist", dir.display()),
        ));
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| WmtsError::Io(format!("Failed to read {}: {}", dir.display(), e)))?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    paths.sort();
    Ok(paths)
}

pub(crate) fn read_document(path: &Path) -> WmtsResult<String> {
    fs::read_to_string(path)
        .map_err(|e| WmtsError::Io(format!("Failed to read {}: {}", path.display(), e)))
}

// ============================================================================
// Map sources
// ============================================================================

/// Parse a map source document. An unknown `type` is a Validation error.
pub fn parse_map_source(json: &str) -> WmtsResult<MapSource> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    match value.get("type").and_then(|t| t.as_str()) {
        Some(kind) if MAP_SOURCE_TYPES.contains(&kind) => Ok(serde_json::from_value(value)?),
        Some(kind) => Err(WmtsError::validation(
            "type",
            format!("unsupported map source type '{}'", kind),
        )),
        None => Err(WmtsError::validation("type", "missing map source type")),
    }
}

/// Upstream map sources, keyed by lower-cased identifier.
#[derive(Debug, Clone, Default)]
pub struct MapSourceRepository {
    sources: BTreeMap<String, Arc<MapSource>>,
}

impl MapSourceRepository {
    pub fn load(dir: impl AsRef<Path>) -> WmtsResult<Self> {
        let dir = dir.as_ref();
        let mut repository = Self::default();

        for path in json_documents(dir)? {
            match read_document(&path).and_then(|json| parse_map_source(&json)) {
                Ok(source) => repository.insert(source),
                Err(e) => warn!(error = %e, path = %path.display(), "Skipping map source"),
            }
        }

        info!(count = repository.sources.len(), path = %dir.display(), "Loaded map sources");
        Ok(repository)
    }

    pub fn insert(&mut self, source: MapSource) {
        self.sources
            .insert(source.identifier().to_lowercase(), Arc::new(source));
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<MapSource>> {
        self.sources.get(&identifier.to_lowercase()).cloned()
    }

    /// Like [`get`](Self::get) but fails with NotFound.
    pub fn require(&self, identifier: &str) -> WmtsResult<Arc<MapSource>> {
        self.get(identifier)
            .ok_or_else(|| WmtsError::not_found("Map source", identifier))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.sources.contains_key(&identifier.to_lowercase())
    }

    pub fn list(&self) -> Vec<Arc<MapSource>> {
        self.sources.values().cloned().collect()
    }
}

// ============================================================================
// Tile matrix sets
// ============================================================================

/// Tile matrix sets ("gridsets"), keyed by lower-cased identifier.
#[derive(Debug, Clone, Default)]
pub struct TileMatrixSetRepository {
    sets: BTreeMap<String, Arc<TileMatrixSet>>,
}

impl TileMatrixSetRepository {
    pub fn load(dir: impl AsRef<Path>, srs: &SrsRegistry) -> WmtsResult<Self> {
        let dir = dir.as_ref();
        let mut repository = Self::default();

        for path in json_documents(dir)? {
            let parsed = read_document(&path)
                .and_then(|json| Ok(serde_json::from_str::<TileMatrixSetOptions>(&json)?))
                .and_then(|options| TileMatrixSet::from_options(&options, srs));

            match parsed {
                Ok(tms) => repository.insert(tms),
                Err(e) => warn!(error = %e, path = %path.display(), "Skipping tile matrix set"),
            }
        }

        info!(count = repository.sets.len(), path = %dir.display(), "Loaded tile matrix sets");
        Ok(repository)
    }

    pub fn insert(&mut self, tms: TileMatrixSet) {
        self.sets
            .insert(tms.identifier().to_lowercase(), Arc::new(tms));
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<TileMatrixSet>> {
        self.sets.get(&identifier.to_lowercase()).cloned()
    }

    pub fn list(&self) -> Vec<Arc<TileMatrixSet>> {
        self.sets.values().cloned().collect()
    }
}

impl TileMatrixSetLookup for TileMatrixSetRepository {
    fn tile_matrix_set(&self, identifier: &str) -> Option<Arc<TileMatrixSet>> {
        self.get(identifier)
    }
}
