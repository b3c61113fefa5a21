//! Forecast page endpoints.
//!
//! Both routes make sure the forecast file exists first, generating it inline
//! on the first request after a fresh deployment. Generation runs under the
//! router's forecast lock, so concurrent first requests fit the model once.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::info;

use super::{blocking, AppState};
use super::readings::{SeriesQuery, SeriesResponse};
use crate::analysis::{self, TimeWindow};
use crate::dataset;
use crate::error::{DashboardError, Result};
use crate::forecast::{self, ModelSettings, Outlook, Outcome};
use crate::models::ForecastRecord;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/forecast", get(series))
        .route("/api/forecast/outlook", get(outlook))
}

/// Generate the forecast file if it is missing, one caller at a time.
async fn ensure(state: &AppState) -> Result<Outcome> {
    // ---
    let _guard = state.forecast_lock.lock().await;
    let config = &state.config;
    let data_path = config.data_path.clone();
    let forecast_path = config.forecast_path.clone();
    let year = config.forecast_year;

    let outcome = blocking(move || {
        forecast::ensure_forecast(&data_path, &forecast_path, year, ModelSettings::default())
    })
    .await?;
    if let Outcome::Generated { rows } = outcome {
        info!("Generated {} forecast rows on request", rows);
    }
    Ok(outcome)
}

/// Ensure the forecast exists, then load it.
async fn load(state: &AppState) -> Result<Vec<ForecastRecord>> {
    // ---
    ensure(state).await?;
    let forecast_path = state.config.forecast_path.clone();
    blocking(move || dataset::load_forecast(&forecast_path)).await
}

async fn series(
    State(state): State<AppState>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>> {
    // ---
    let sensor = params.sensor()?;
    let records = load(&state).await?;

    let window = TimeWindow::resolve(&records, &params.window())?;
    let filtered = analysis::filter_window(&records, window);
    let points = analysis::series(filtered.iter().copied(), sensor);

    info!("GET /api/forecast - {} points for {}", points.len(), sensor.predicted_column());
    Ok(Json(SeriesResponse::new(sensor, window, points)))
}

#[derive(Debug, Deserialize)]
struct OutlookQuery {
    date: Option<NaiveDate>,
}

/// Calendar date at the deployment site for the instant `now`.
fn site_today(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

async fn outlook(
    State(state): State<AppState>,
    Query(params): Query<OutlookQuery>,
) -> Result<Json<Outlook>> {
    // ---
    let today = params
        .date
        .unwrap_or_else(|| site_today(state.config.site_timezone, Utc::now()));
    let records = load(&state).await?;

    let view = forecast::outlook(&records, today);
    if view.today.is_none() {
        return Err(DashboardError::NoData(format!(
            "No data available for today ({today})."
        )));
    }
    Ok(Json(view))
}
