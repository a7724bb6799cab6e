//! On-disk tile layout.
//!
//! Every path handed out here lives under the cache root: identifiers coming
//! from requests go through [`sanitize_path`] before being joined.

use std::path::{Path, PathBuf};

use wmts_common::{FilePathScheme, TileObject, WmtsError, WmtsResult};

const RESERVED: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Neutralize a user supplied relative path.
///
/// Separators (`/` and `\`) split the input into components. Empty, `.` and
/// `..` components are dropped, reserved and control characters are replaced
/// with `_`. The result is always relative and may be empty.
pub fn sanitize_path(input: &str) -> String {
    input
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != "." && *c != "..")
        .map(|c| {
            c.chars()
                .map(|ch| {
                    if ch.is_control() || RESERVED.contains(&ch) {
                        '_'
                    } else {
                        ch
                    }
                })
                .collect::<String>()
        })
        .filter(|c| !c.trim_matches('.').is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Storage path of a tile inside a layer folder.
pub trait TilePathGenerator: Send + Sync {
    fn tile_path(&self, layer_path: &Path, tile: &TileObject<'_>) -> WmtsResult<PathBuf>;
}

/// `{style}/{gridSetId}/{zoom}/{col}-{row}.{ext}`
#[derive(Debug, Default, Clone, Copy)]
pub struct XyzTilePathGenerator;

impl TilePathGenerator for XyzTilePathGenerator {
    fn tile_path(&self, layer_path: &Path, tile: &TileObject<'_>) -> WmtsResult<PathBuf> {
        if layer_path.as_os_str().is_empty() {
            return Err(WmtsError::validation("layerPath", "cannot be empty"));
        }

        let (col, row, zoom) = tile.xyz();
        let relative = format!(
            "{}/{}/{}/{}-{}.{}",
            tile.style,
            tile.grid_set_id(),
            zoom,
            col,
            row,
            tile.mime_type.file_extension
        );

        Ok(layer_path.join(sanitize_path(&relative)))
    }
}

/// Resolves layer folders and tile files under the cache root.
#[derive(Debug, Clone)]
pub struct FilePathGenerator {
    cache_root: PathBuf,
}

impl FilePathGenerator {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// `{cacheRoot}/{sanitize(layer)}`. Fails with Validation when nothing
    /// usable is left of the name.
    pub fn layer_path(&self, layer_name: &str) -> WmtsResult<PathBuf> {
        let sanitized = sanitize_path(layer_name);
        if sanitized.is_empty() {
            return Err(WmtsError::validation(
                "layer",
                format!("'{}' is not a usable layer name", layer_name),
            ));
        }
        Ok(self.cache_root.join(sanitized))
    }

    /// Only the xyz scheme is implemented; geowebcache fails with
    /// NotImplemented.
    pub fn tile_path(&self, scheme: FilePathScheme, tile: &TileObject<'_>) -> WmtsResult<PathBuf> {
        let generator: &dyn TilePathGenerator = match scheme {
            FilePathScheme::Xyz => &XyzTilePathGenerator,
            FilePathScheme::Geowebcache => {
                return Err(WmtsError::NotImplemented(format!(
                    "file path scheme '{}'",
                    scheme
                )))
            }
        };

        let layer_path = self.layer_path(tile.layer_name)?;
        generator.tile_path(&layer_path, tile)
    }
}
