//! HTTP request handlers for the chart service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chartkit::filename::is_valid_chart_id;
use chartkit::{Bounds, ChartLoadError, ChartSummary, FeatureHit};
use geojson::{FeatureCollection, JsonValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Default search radius for `/features/near`, in degrees.
pub const DEFAULT_RADIUS: f64 = 0.01;

/// Viewport query parameters.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BoundsQuery {
    /// Northern boundary latitude.
    pub north: f64,
    /// Southern boundary latitude.
    pub south: f64,
    /// Eastern boundary longitude.
    pub east: f64,
    /// Western boundary longitude.
    pub west: f64,
}

/// Point query parameters.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct NearQuery {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Half-width of the search square in degrees (default 0.01).
    pub radius: Option<f64>,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Cache and pipeline statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of charts in cache.
    pub cached_charts: u64,
    /// Cache hit count.
    pub cache_hits: u64,
    /// Cache miss count.
    pub cache_misses: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
    /// Pipeline runs started.
    pub pipeline_runs: u64,
    /// Loads that joined an in-flight run.
    pub coalesced_loads: u64,
    /// Charts with a pinned content hash.
    pub pinned_charts: usize,
}

/// Geographic rectangle.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoundsResponse {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl From<Bounds> for BoundsResponse {
    fn from(b: Bounds) -> Self {
        Self {
            north: b.north,
            south: b.south,
            east: b.east,
            west: b.west,
        }
    }
}

/// A loaded chart.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChartInfo {
    /// Chart id.
    pub chart_id: String,
    /// Number of features.
    pub feature_count: usize,
    /// Well-formed ISO 8211 records.
    pub record_count: usize,
    /// Corrupt records skipped by the decoder.
    pub decode_errors: usize,
    /// Records that could not become features.
    pub skipped_features: usize,
    /// Hex SHA-256 of the chart bytes.
    pub content_hash: String,
    /// Size of the chart bytes.
    pub size_bytes: usize,
    /// Extent of the chart's features.
    pub bounds: Option<BoundsResponse>,
}

impl From<ChartSummary> for ChartInfo {
    fn from(s: ChartSummary) -> Self {
        Self {
            chart_id: s.chart_id,
            feature_count: s.feature_count,
            record_count: s.record_count,
            decode_errors: s.decode_errors,
            skipped_features: s.skipped_features,
            content_hash: s.content_hash,
            size_bytes: s.size_bytes,
            bounds: s.bounds.map(BoundsResponse::from),
        }
    }
}

/// Discovered and loaded charts.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChartsResponse {
    /// Chart ids found in the data directory.
    pub available: Vec<String>,
    /// Charts currently loaded.
    pub loaded: Vec<ChartInfo>,
}

/// Outcome of a chart load.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoadResponse {
    /// Chart id.
    pub chart_id: String,
    /// Whether the chart loaded.
    pub success: bool,
    /// Parse retries performed.
    pub retry_count: u32,
    /// Wall time of the load in milliseconds.
    pub duration_ms: u64,
    /// The loaded chart.
    pub chart: Option<ChartInfo>,
    /// Why the load failed.
    pub error: Option<String>,
}

/// Load queue snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueResponse {
    /// Chart currently loading.
    pub current_chart_id: Option<String>,
    /// Charts waiting, in order.
    pub pending_ids: Vec<String>,
    /// Charts waiting plus the one loading.
    pub queue_length: usize,
}

/// Result of clearing the queue.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearQueueResponse {
    /// Pending loads cancelled.
    pub cancelled: usize,
}

/// Result of cancelling one load.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// Chart id.
    pub chart_id: String,
    /// Whether a pending or running load was cancelled.
    pub cancelled: bool,
}

fn error_json(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get cache and pipeline statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Current statistics", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let service = &state.chart_service;
    let stats = service.cache_stats();
    let pipeline = service.pipeline().stats();

    Json(StatsResponse {
        cached_charts: stats.entry_count,
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        hit_rate: stats.hit_rate(),
        pipeline_runs: pipeline.runs,
        coalesced_loads: pipeline.coalesced,
        pinned_charts: service.integrity().len(),
    })
}

/// List discovered and loaded charts.
#[utoipa::path(
    get,
    path = "/charts",
    tag = "charts",
    responses((status = 200, description = "Chart listing", body = ChartsResponse))
)]
pub async fn list_charts(State(state): State<Arc<AppState>>) -> Json<ChartsResponse> {
    Json(ChartsResponse {
        available: state.chart_service.scan_chart_files(),
        loaded: state
            .chart_service
            .loaded_charts()
            .into_iter()
            .map(ChartInfo::from)
            .collect(),
    })
}

/// Load a chart through the queue and wait for the outcome.
///
/// # Returns
///
/// - `200 OK` when the chart is loaded (or already cached)
/// - `400 Bad Request` if the chart id is malformed
/// - `404 Not Found` if there is no data for the chart
/// - `409 Conflict` if the content changed since first load, or the load was cancelled
/// - `422 Unprocessable Entity` if the chart could not be parsed
/// - `503 Service Unavailable` if the service is shutting down
#[utoipa::path(
    post,
    path = "/charts/{chart_id}/load",
    tag = "charts",
    params(("chart_id" = String, Path, description = "Chart id, e.g. US5MA10M")),
    responses(
        (status = 200, description = "Chart loaded", body = LoadResponse),
        (status = 400, description = "Invalid chart id", body = ErrorResponse),
        (status = 404, description = "No data for chart", body = LoadResponse),
        (status = 409, description = "Integrity failure or cancelled", body = LoadResponse),
        (status = 422, description = "Chart could not be parsed", body = LoadResponse),
        (status = 503, description = "Service shutting down", body = ErrorResponse)
    )
)]
pub async fn load_chart(
    State(state): State<Arc<AppState>>,
    Path(chart_id): Path<String>,
) -> impl IntoResponse {
    if !is_valid_chart_id(&chart_id) {
        return error_json(
            StatusCode::BAD_REQUEST,
            format!("invalid chart id {:?}", chart_id),
        );
    }

    let result = match state.chart_service.load_chart(&chart_id).await {
        Ok(result) => result,
        Err(e) => return error_json(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    };

    let status = match result.error() {
        None => StatusCode::OK,
        Some(ChartLoadError::DataNotFound { .. }) => StatusCode::NOT_FOUND,
        Some(ChartLoadError::Integrity { .. })
        | Some(ChartLoadError::Cancelled { .. })
        | Some(ChartLoadError::Abandoned { .. }) => StatusCode::CONFLICT,
        Some(ChartLoadError::Parsing { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ChartLoadError::Extraction { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match result.error() {
        None => tracing::info!(
            chart_id = %chart_id,
            retry_count = result.retry_count,
            duration_ms = result.duration_ms,
            "Chart loaded"
        ),
        Some(e) => tracing::warn!(chart_id = %chart_id, error = %e, "Chart load failed"),
    }

    let body = LoadResponse {
        chart_id: result.chart_id.clone(),
        success: result.is_success(),
        retry_count: result.retry_count,
        duration_ms: result.duration_ms,
        chart: result
            .chart()
            .map(|chart| ChartInfo::from(ChartSummary::from(chart.as_ref()))),
        error: result.error().map(ToString::to_string),
    };
    (status, Json(body)).into_response()
}

/// Get the load queue.
#[utoipa::path(
    get,
    path = "/queue",
    tag = "queue",
    responses((status = 200, description = "Queue snapshot", body = QueueResponse))
)]
pub async fn get_queue(State(state): State<Arc<AppState>>) -> Json<QueueResponse> {
    let status = state.chart_service.queue_status();
    Json(QueueResponse {
        current_chart_id: status.current_chart_id,
        pending_ids: status.pending_ids,
        queue_length: status.queue_length,
    })
}

/// Cancel every pending load. The running load is not interrupted.
#[utoipa::path(
    delete,
    path = "/queue",
    tag = "queue",
    responses((status = 200, description = "Pending loads cancelled", body = ClearQueueResponse))
)]
pub async fn clear_queue(State(state): State<Arc<AppState>>) -> Json<ClearQueueResponse> {
    let cancelled = state.chart_service.clear_queue();
    tracing::info!(cancelled, "Queue cleared");
    Json(ClearQueueResponse { cancelled })
}

/// Cancel the load of one chart.
#[utoipa::path(
    delete,
    path = "/queue/{chart_id}",
    tag = "queue",
    params(("chart_id" = String, Path, description = "Chart id")),
    responses(
        (status = 200, description = "Load cancelled", body = CancelResponse),
        (status = 404, description = "Chart not queued or loading", body = CancelResponse)
    )
)]
pub async fn cancel_load(
    State(state): State<Arc<AppState>>,
    Path(chart_id): Path<String>,
) -> impl IntoResponse {
    let cancelled = state.chart_service.cancel(&chart_id);
    let status = if cancelled {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(CancelResponse { chart_id, cancelled }))
}

/// Features of loaded charts intersecting a viewport, as GeoJSON.
#[utoipa::path(
    get,
    path = "/features",
    tag = "features",
    params(BoundsQuery),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection"),
        (status = 400, description = "Invalid bounds", body = ErrorResponse)
    )
)]
pub async fn get_features(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoundsQuery>,
) -> impl IntoResponse {
    let Some(bounds) = Bounds::checked(query.north, query.south, query.east, query.west) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "bounds must satisfy north >= south and east >= west".to_string(),
        );
    };

    let hits = state.chart_service.query_bounds(&bounds);
    tracing::debug!(%bounds, hits = hits.len(), "Viewport query");
    Json(hits_to_collection(&hits)).into_response()
}

/// Features of loaded charts near a point, as GeoJSON.
#[utoipa::path(
    get,
    path = "/features/near",
    tag = "features",
    params(NearQuery),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection"),
        (status = 400, description = "Invalid radius", body = ErrorResponse)
    )
)]
pub async fn get_features_near(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearQuery>,
) -> impl IntoResponse {
    let radius = query.radius.unwrap_or(DEFAULT_RADIUS);
    if !radius.is_finite() || radius < 0.0 {
        return error_json(
            StatusCode::BAD_REQUEST,
            format!("radius must be a non-negative number, got {}", radius),
        );
    }

    let hits = state.chart_service.query_point(query.lat, query.lon, radius);
    tracing::debug!(
        lat = query.lat,
        lon = query.lon,
        radius,
        hits = hits.len(),
        "Point query"
    );
    Json(hits_to_collection(&hits)).into_response()
}

/// GeoJSON collection with the source chart of each feature as a property.
fn hits_to_collection(hits: &[FeatureHit]) -> FeatureCollection {
    let mut collection = chartkit::geojson::features_to_collection(hits.iter().map(|h| &h.feature));
    for (feature, hit) in collection.features.iter_mut().zip(hits) {
        feature.set_property("chart_id", JsonValue::from(hit.chart_id.as_str()));
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_query_deserialize() {
        let json = r#"{"north": 42.4, "south": 42.3, "east": -70.9, "west": -71.0}"#;
        let query: BoundsQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.north, 42.4);
        assert_eq!(query.west, -71.0);
    }

    #[test]
    fn test_near_query_default_radius() {
        let json = r#"{"lat": 42.35, "lon": -70.95}"#;
        let query: NearQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.radius, None);
    }

    #[test]
    fn test_load_response_serialize() {
        let response = LoadResponse {
            chart_id: "US5MA10M".to_string(),
            success: false,
            retry_count: 4,
            duration_ms: 1500,
            chart: None,
            error: Some("parsing failed".to_string()),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("US5MA10M"));
        assert!(json.contains("\"retry_count\":4"));
        assert!(json.contains("parsing failed"));
    }

    #[test]
    fn test_health_response_serialize() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }
}
