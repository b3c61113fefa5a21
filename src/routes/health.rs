// src/routes/health.rs
//! Health check endpoint.
//!
//! `/health` lets container orchestrators and CI verify that the service is
//! up. Besides liveness it reports whether the forecast file has been
//! generated yet, without reading either data file.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::Config;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    data_present: bool,
    forecast_ready: bool,
}

/// Handle `GET /health`.
async fn health(State(config): State<Config>) -> Json<HealthResponse> {
    // ---
    Json(HealthResponse {
        status: "ok",
        data_present: config.data_path.exists(),
        forecast_ready: config.forecast_path.exists(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
