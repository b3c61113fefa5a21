//! Correlation analyzer endpoints.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{blocking, readings::parse_sensor, AppState};
use crate::analysis::{self, CorrelationMatrix};
use crate::error::{DashboardError, Result};
use crate::models::Sensor;
use crate::{dataset, Config};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/correlation", get(matrix))
        .route("/api/correlation/pair", get(pair))
}

async fn matrix(State(config): State<Config>) -> Result<Json<CorrelationMatrix>> {
    // ---
    let path = config.data_path.clone();
    let readings = blocking(move || dataset::load_readings(&path)).await?;
    Ok(Json(analysis::correlation_matrix(&readings)))
}

#[derive(Debug, Deserialize)]
struct PairQuery {
    first: String,
    second: String,
}

#[derive(Debug, Serialize)]
struct PairResponse {
    first: Sensor,
    second: Sensor,
    coefficient: Option<f64>,
    explanation: Option<&'static str>,
}

async fn pair(
    State(config): State<Config>,
    Query(params): Query<PairQuery>,
) -> Result<Json<PairResponse>> {
    // ---
    let first = parse_sensor(&params.first)?;
    let second = parse_sensor(&params.second)?;
    if first == second {
        return Err(DashboardError::BadRequest(
            "Please select two different factors to calculate correlation.".into(),
        ));
    }

    let path = config.data_path.clone();
    let readings = blocking(move || dataset::load_readings(&path)).await?;
    let coefficient = analysis::correlation_matrix(&readings).get(first, second);

    Ok(Json(PairResponse {
        first,
        second,
        coefficient,
        explanation: coefficient.map(analysis::explain_correlation),
    }))
}
