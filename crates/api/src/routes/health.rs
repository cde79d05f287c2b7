use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Open real-time connections.
    pub realtime_connections: usize,
    /// Topic subscriptions across those connections.
    pub realtime_subscriptions: usize,
}

/// GET /health -- returns service, database and real-time health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = pinwatch_db::health_check(&state.pool).await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        realtime_connections: state.ws_manager.connection_count(),
        realtime_subscriptions: state.ws_manager.subscription_count(),
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
