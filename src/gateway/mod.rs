//! HTTP gateway (Axum): health probes, statistics and the `/ws` conversation socket.
//!
//! The gateway only moves bytes. Every protocol decision lives in
//! [`crate::session::SessionController`].

pub mod error;
pub mod handler;
pub mod state;
pub mod ws;

#[cfg(test)]
mod handler_tests;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{StatsResponse, stats_handler};
pub use state::AppState;
pub use ws::{SessionId, ws_handler};

pub const MURMUR_STATUS_HEADER: &str = "x-murmur-status";
pub const MURMUR_STATUS_HEALTHY: &str = "healthy";
pub const MURMUR_STATUS_READY: &str = "ready";
pub const MURMUR_STATUS_DEGRADED: &str = "degraded";

pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub cache: &'static str,
    pub providers: &'static str,
    pub enabled_providers: usize,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        MURMUR_STATUS_HEADER,
        HeaderValue::from_static(MURMUR_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// Ready once at least one generation provider is enabled.
///
/// An unreachable shared store only degrades the cache: lookups skip that tier.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let enabled_providers = state.racer().enabled_count();
    let cache = if state.cache().shared_store_available().await {
        MURMUR_STATUS_READY
    } else {
        MURMUR_STATUS_DEGRADED
    };
    let components = ComponentStatus {
        http: MURMUR_STATUS_READY,
        cache,
        providers: if enabled_providers > 0 {
            MURMUR_STATUS_READY
        } else {
            "none"
        },
        enabled_providers,
    };

    let is_ready = components.providers == MURMUR_STATUS_READY;
    let status_code = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let status_msg = if is_ready { "ok" } else { "pending" };

    let mut headers = HeaderMap::new();
    headers.insert(MURMUR_STATUS_HEADER, HeaderValue::from_static(status_msg));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
