//! chartkit Service - HTTP microservice for ENC chart loading and feature queries.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CHARTKIT_DATA_DIR` | Directory containing ENC cells | Current directory |
//! | `CHARTKIT_CACHE_SIZE` | Maximum loaded charts in memory | 32 |
//! | `CHARTKIT_INDEX` | Spatial index: `tree` or `linear` | `tree` |
//! | `CHARTKIT_PORT` | HTTP server port | 8080 |
//! | `CHARTKIT_PRELOAD` | Load every chart at startup (`true`, `1`) | false |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /stats` - Cache and pipeline statistics
//! - `GET /charts` - Discovered and loaded charts
//! - `POST /charts/{chart_id}/load` - Load a chart through the queue
//! - `GET /queue` - Queue snapshot
//! - `DELETE /queue` - Cancel every pending load
//! - `DELETE /queue/{chart_id}` - Cancel one load
//! - `GET /features?north=..&south=..&east=..&west=..` - Viewport query (GeoJSON)
//! - `GET /features/near?lat=..&lon=..&radius=..` - Point query (GeoJSON)
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use chartkit::ChartServiceBuilder;
use chartkit_service::{create_router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartkit_service=info,chartkit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load port from environment (service-specific config)
    let port: u16 = std::env::var("CHARTKIT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    // The library handles CHARTKIT_DATA_DIR, CHARTKIT_CACHE_SIZE and CHARTKIT_INDEX
    let builder = if std::env::var_os("CHARTKIT_DATA_DIR").is_some() {
        ChartServiceBuilder::from_env()?
    } else {
        // Fallback: CHARTKIT_DATA_DIR not set, use current directory
        tracing::warn!("CHARTKIT_DATA_DIR not set, using current directory");
        ChartServiceBuilder::new(".")
    };
    let chart_service = builder.build();

    tracing::info!(
        data_dir = %chart_service.data_dir().display(),
        cache_capacity = chart_service.cache_capacity(),
        index = %chart_service.index_kind(),
        port = port,
        "Starting chartkit service"
    );

    if preload_requested() {
        tracing::info!("Preloading charts into cache");
        chart_service.preload().await;
    }

    let state = Arc::new(AppState { chart_service });
    let app = create_router(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.chart_service.shutdown();
    Ok(())
}

/// Whether `CHARTKIT_PRELOAD` asks for a startup preload.
fn preload_requested() -> bool {
    std::env::var("CHARTKIT_PRELOAD")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "all" | "1"))
        .unwrap_or(false)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
