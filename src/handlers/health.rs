//! Liveness endpoint.
//!
//! `GET /health` always returns 200 with process details; the proxy has no
//! long-lived upstream connection whose loss could degrade it, so there is
//! no separate readiness state.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "uptime_seconds": 3600,
///   "cache_entries": 12,
///   "timestamp": "2026-08-30T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        cache_entries: state.cache.len(),
        timestamp: Utc::now(),
    })
}
