//! chartkit Service Library
//!
//! HTTP handlers, router and OpenAPI document for the chart service.
//! This library is used by both the chartkit-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chartkit::ChartService;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
pub struct AppState {
    /// Chart service for loads and feature queries.
    pub chart_service: ChartService,
}

/// OpenAPI documentation for the chart service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "chartkit Chart Service",
        version = "0.1.0",
        description = "REST API for loading ENC charts and querying maritime features.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::health_check,
        handlers::get_stats,
        handlers::list_charts,
        handlers::load_chart,
        handlers::get_queue,
        handlers::clear_queue,
        handlers::cancel_load,
        handlers::get_features,
        handlers::get_features_near,
    ),
    components(
        schemas(
            handlers::BoundsQuery,
            handlers::NearQuery,
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::StatsResponse,
            handlers::BoundsResponse,
            handlers::ChartInfo,
            handlers::ChartsResponse,
            handlers::LoadResponse,
            handlers::QueueResponse,
            handlers::ClearQueueResponse,
            handlers::CancelResponse,
        )
    ),
    tags(
        (name = "charts", description = "Chart discovery and loading"),
        (name = "queue", description = "Load queue inspection and cancellation"),
        (name = "features", description = "Feature queries over loaded charts"),
        (name = "system", description = "System and health endpoints")
    )
)]
pub struct ApiDoc;

/// Build the application router with Swagger UI, tracing and CORS.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .route("/charts", get(handlers::list_charts))
        .route("/charts/:chart_id/load", post(handlers::load_chart))
        .route(
            "/queue",
            get(handlers::get_queue).delete(handlers::clear_queue),
        )
        .route("/queue/:chart_id", delete(handlers::cancel_load))
        .route("/features", get(handlers::get_features))
        .route("/features/near", get(handlers::get_features_near))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{
    BoundsQuery, ChartInfo, ChartsResponse, ErrorResponse, HealthResponse, LoadResponse,
    NearQuery, QueueResponse, StatsResponse,
};
