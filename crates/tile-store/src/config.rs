//! Server options file (`server.json`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use wmts_common::{MimeType, MimeTypeRegistry, WmtsError, WmtsResult};

/// Locations of the cache tree and of the configuration directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOptions {
    /// Root of the on-disk tile cache
    pub cache_root: PathBuf,
    /// Directory of map source documents
    pub map_sources_path: PathBuf,
    /// Directory of tile matrix set documents
    pub tile_matrix_sets_path: PathBuf,
    /// Directory of layer definition documents
    pub layers_path: PathBuf,
    /// Formats declared on top of the builtin ones
    #[serde(default)]
    pub mime_types: Vec<MimeType>,
}

impl ServerOptions {
    /// Read options from a JSON file. Relative paths are resolved against the
    /// directory containing the file.
    pub fn load(path: impl AsRef<Path>) -> WmtsResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            WmtsError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let options: ServerOptions = serde_json::from_str(&contents)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(options.resolve_against(base))
    }

    /// Make every relative path relative to `base`.
    pub fn resolve_against(mut self, base: &Path) -> Self {
        for dir in [
            &mut self.cache_root,
            &mut self.map_sources_path,
            &mut self.tile_matrix_sets_path,
            &mut self.layers_path,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }

    /// Check that every configuration directory exists, creating the cache
    /// root when it is missing. Every problem is logged; the first one is
    /// returned.
    pub fn validate_configuration(&self) -> WmtsResult<()> {
        let mut first_error = None;

        if !self.cache_root.exists() {
            match fs::create_dir_all(&self.cache_root) {
                Ok(()) => info!(path = %self.cache_root.display(), "Created cache root"),
                Err(e) => {
                    error!(path = %self.cache_root.display(), error = %e, "Cannot create cache root");
                    first_error.get_or_insert(WmtsError::Io(format!(
                        "Failed to create cache root {}: {}",
                        self.cache_root.display(),
                        e
                    )));
                }
            }
        }

        for (field, dir) in [
            ("mapSourcesPath", &self.map_sources_path),
            ("tileMatrixSetsPath", &self.tile_matrix_sets_path),
            ("layersPath", &self.layers_path),
        ] {
            if !dir.is_dir() {
                error!(field, path = %dir.display(), "Configured folder does not exist");
                first_error.get_or_insert(WmtsError::validation(
                    field,
                    format!("folder '{}' does not exist", dir.display()),
                ));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Builtin formats plus the declared ones.
    pub fn mime_registry(&self) -> MimeTypeRegistry {
        MimeTypeRegistry::with_extra(self.mime_types.iter().cloned())
    }
}
