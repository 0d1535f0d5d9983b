//! Study API
//!
//! REST endpoints for sessions, attempts, queue previews and stats, plus a
//! WebSocket event stream at `/ws`.

pub mod error;
pub mod events;
pub mod handlers;
pub mod state;
pub mod websocket;

use std::net::SocketAddr;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

pub use error::ApiError;
pub use events::DrillEvent;
pub use state::AppState;

/// Requests handled at once before callers queue
const CONCURRENCY_LIMIT: usize = 64;

/// Build the axum router with all API routes
pub fn build_router(state: AppState, port: u16) -> Router {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| HeaderValue::from_str(origin).ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let no_store = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );

    Router::new()
        // WebSocket for real-time events
        .route("/ws", get(websocket::ws_handler))
        // Sessions
        .route("/api/sessions", post(handlers::start_session))
        .route("/api/sessions/{id}", get(handlers::get_session))
        .route("/api/sessions/{id}/attempts", post(handlers::record_attempt))
        .route("/api/sessions/{id}/end", post(handlers::end_session))
        // Attempts outside a session
        .route("/api/attempts", post(handlers::log_attempt))
        // Queue, items, stats & health
        .route("/api/due", get(handlers::get_due))
        .route("/api/items/{id}", get(handlers::get_item))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/health", get(handlers::health_check))
        .layer(
            ServiceBuilder::new()
                .concurrency_limit(CONCURRENCY_LIMIT)
                .layer(cors)
                .layer(no_store),
        )
        .with_state(state)
}

/// Serve the API until Ctrl-C or a listener failure
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(state, addr.port());
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Drill API listening at http://{} (WebSocket at ws://{}/ws)",
        addr, addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
