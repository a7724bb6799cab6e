//! HTTP API: seeding, configuration listings and WMTS tiles from the cache.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, instrument};

use wmts_common::{LayerCreationRequest, MapSource, SpatialReference, WmtsError};
use wmts_protocol::{GetTileRequest, WmtsKvpParams, WmtsRestPath};

use crate::seeding::SeedingRequest;
use crate::state::AppState;
use crate::wmts::get_tile_infos;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Seeding
        .route("/seed", post(seed_handler))
        .route("/seed/count", post(seed_count_handler))
        .route("/seed/describe", post(seed_describe_handler))
        .route("/seed/tasks", get(list_tasks_handler))
        .route("/seed/tasks/:id", get(get_task_handler))
        .route("/seed/tasks/:id/cancel", post(cancel_task_handler))
        .route("/seed/clear-cache/:layer", post(clear_cache_handler))
        // Configuration
        .route("/api/srs", get(srs_handler))
        .route("/api/tilematrixsets", get(tile_matrix_sets_handler))
        .route("/api/sources", get(map_sources_handler))
        .route("/api/layers", get(layers_handler))
        .route("/layers/create", post(create_layer_handler))
        // WMTS
        .route("/wmts", get(wmts_kvp_handler))
        .route(
            "/wmts/:layer/:style/:tms/:tile_matrix/:row/:file",
            get(wmts_rest_handler),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

fn error_response(e: WmtsError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

// ============================================================================
// Health and metrics
// ============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let body = match &state.prometheus {
        Some(handle) => handle.render(),
        None => state.metrics.render(),
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

// ============================================================================
// Seeding
// ============================================================================

pub async fn seed_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SeedingRequest>,
) -> Response {
    match state.seeding.start_seeding(&request).await {
        Ok(task) => (
            StatusCode::ACCEPTED,
            Json(json!({ "taskId": task.id(), "tileCount": task.tile_count() })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn seed_count_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SeedingRequest>,
) -> Response {
    match state.seeding.tile_count(&request).await {
        Ok(count) => Json(json!({ "tileCount": count })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn seed_describe_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SeedingRequest>,
) -> Response {
    match state.seeding.describe(&request).await {
        Ok(count) => Json(json!({ "tileCount": count })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_tasks_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.seeding.task_summaries().await)
}

pub async fn get_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Response {
    match state.seeding.get_task(id).await {
        Some(task) => Json(task.summary()).into_response(),
        None => error_response(WmtsError::not_found("Seeding task", id.to_string())),
    }
}

pub async fn cancel_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Response {
    match state.seeding.cancel_task(id).await {
        Ok(()) => Json(json!({ "taskId": id, "cancelled": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn clear_cache_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(layer): Path<String>,
) -> Response {
    match state.seeding.clear_layer_cache(&layer).await {
        Ok(()) => Json(json!({ "layer": layer, "cleared": true })).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Configuration listings
// ============================================================================

pub async fn srs_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let references: Vec<SpatialReference> = state
        .catalog
        .srs
        .list()
        .iter()
        .map(|srs| srs.as_ref().clone())
        .collect();
    Json(references)
}

pub async fn tile_matrix_sets_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let sets: Vec<_> = state
        .catalog
        .tile_matrix_sets
        .list()
        .iter()
        .map(|tms| tms.to_options())
        .collect();
    Json(sets)
}

pub async fn map_sources_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let sources: Vec<MapSource> = state
        .catalog
        .map_sources
        .list()
        .iter()
        .map(|source| source.as_ref().clone())
        .collect();
    Json(sources)
}

pub async fn layers_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let layers: Vec<_> = state
        .catalog
        .layers
        .list()
        .await
        .iter()
        .map(|layer| layer.to_options())
        .collect();
    Json(layers)
}

pub async fn create_layer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<LayerCreationRequest>,
) -> Response {
    let catalog = &state.catalog;
    let created = catalog
        .layers
        .create_layer(
            &request,
            &catalog.map_sources,
            &catalog.tile_matrix_sets,
            &catalog.mime_types,
            catalog.transform.as_ref(),
        )
        .await;

    match created {
        Ok(layer) => (StatusCode::CREATED, Json(layer.to_options())).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// WMTS
// ============================================================================

pub async fn wmts_kvp_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<WmtsKvpParams>,
) -> Response {
    match params.into_get_tile() {
        Ok(request) => serve_tile(&state, request).await,
        Err(e) => error_response(e),
    }
}

pub async fn wmts_rest_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((layer, style, tms, tile_matrix, row, file)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Response {
    let path = format!("{}/{}/{}/{}/{}/{}", layer, style, tms, tile_matrix, row, file);
    match WmtsRestPath::parse(&path) {
        Ok(rest) => serve_tile(&state, rest.into_request()).await,
        Err(e) => error_response(e),
    }
}

#[instrument(skip(state), fields(layer = %request.layer, tile_matrix = %request.tile_matrix))]
async fn serve_tile(state: &AppState, request: GetTileRequest) -> Response {
    let info = match get_tile_infos(&state.catalog, &request).await {
        Ok(info) => info,
        Err(e) => return error_response(e),
    };

    match tokio::fs::read(&info.path).await {
        Ok(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, info.mime_type.mime_type),
                (header::CACHE_CONTROL, "max-age=3600".to_string()),
            ],
            data,
        )
            .into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %info.path.display(), "Tile not cached");
            error_response(WmtsError::not_found(
                "Tile",
                format!("{}/{}/{}", request.tile_matrix, request.tile_row, request.tile_col),
            ))
        }
        Err(e) => error_response(WmtsError::Io(format!(
            "Failed to read {}: {}",
            info.path.display(),
            e
        ))),
    }
}
