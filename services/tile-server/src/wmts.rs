//! WMTS GetTile resolution against the on-disk cache.

use std::path::PathBuf;

use wmts_common::{LayerCache, MimeType, MimeTypeRegistry, TileObject, WmtsError, WmtsResult};
use wmts_protocol::GetTileRequest;

use crate::state::Catalog;

/// Where a requested tile lives and how to serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileInfo {
    pub path: PathBuf,
    pub mime_type: MimeType,
}

/// `format` is a file extension (REST binding) or a MIME type (KVP binding).
/// The cache's own format wins over the registry when both match.
fn resolve_format<'a>(
    cache: &'a LayerCache,
    registry: &'a MimeTypeRegistry,
    format: &str,
) -> WmtsResult<&'a MimeType> {
    let own = cache.format();
    let extension = format.trim_start_matches('.');
    if own.mime_type.eq_ignore_ascii_case(format) || own.file_extension.eq_ignore_ascii_case(extension)
    {
        return Ok(own);
    }

    registry
        .by_type(format)
        .or_else(|| registry.by_extension(extension))
        .ok_or_else(|| WmtsError::not_found("Format", format))
}

/// Resolve a GetTile request to a cache file. The file may not exist.
pub async fn get_tile_infos(catalog: &Catalog, request: &GetTileRequest) -> WmtsResult<TileInfo> {
    let layer = catalog.layers.require(&request.layer).await?;
    let cache = layer
        .find_cache(&request.tile_matrix_set, &request.style)
        .ok_or_else(|| {
            WmtsError::not_found(
                "Cache",
                format!("{}/{}", request.tile_matrix_set, request.style),
            )
        })?;

    let tms = cache.tile_matrix_set();
    let zoom = tms
        .zoom_level_of(&request.tile_matrix)
        .ok_or_else(|| WmtsError::not_found("Tile matrix", &request.tile_matrix))?;
    let matrix = tms.matrix_at(zoom)?;

    if !matrix.contains_tile(request.tile_col, request.tile_row) {
        return Err(WmtsError::OutOfRange(format!(
            "tile {}/{} outside {}x{} matrix '{}'",
            request.tile_col,
            request.tile_row,
            matrix.matrix_width(),
            matrix.matrix_height(),
            matrix.identifier()
        )));
    }

    let mime_type = resolve_format(cache, &catalog.mime_types, &request.format)?;

    let tile = TileObject {
        layer_name: layer.identifier(),
        style: cache.style(),
        mime_type,
        tile_matrix_set: tms.as_ref(),
        tile_matrix: matrix,
        col: request.tile_col,
        row: request.tile_row,
        zoom,
        parameters: None,
    };

    Ok(TileInfo {
        path: catalog.paths.tile_path(layer.file_path_scheme(), &tile)?,
        mime_type: mime_type.clone(),
    })
}
