//! Historical sensor endpoints backing the landing page charts, the
//! per-sensor pages and the Parameters Details page.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{blocking, AppState};
use crate::analysis::{self, Bin, Extremes, TimeWindow, WindowQuery};
use crate::error::{DashboardError, Result};
use crate::models::{Sensor, SeriesPoint};
use crate::{dataset, Config};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/summary", get(summary))
        .route("/api/readings", get(readings))
        .route("/api/readings/sample", get(sample))
        .route("/api/sensors/{sensor}/distribution", get(distribution))
}

pub(super) fn parse_sensor(raw: &str) -> Result<Sensor> {
    raw.parse::<Sensor>()
        .map_err(|e| DashboardError::BadRequest(e.to_string()))
}

/// Sidebar selection shared by every time-filtered page.
#[derive(Debug, Deserialize)]
pub(super) struct SeriesQuery {
    sensor: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
}

impl SeriesQuery {
    pub(super) fn sensor(&self) -> Result<Sensor> {
        parse_sensor(&self.sensor)
    }

    pub(super) fn window(&self) -> WindowQuery {
        // ---
        WindowQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// A time-filtered series with its min and max cards.
#[derive(Debug, Serialize)]
pub(super) struct SeriesResponse {
    pub sensor: Sensor,
    pub label: &'static str,
    pub window: Option<TimeWindow>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub points: Vec<SeriesPoint>,
}

impl SeriesResponse {
    pub(super) fn new(sensor: Sensor, window: Option<TimeWindow>, points: Vec<SeriesPoint>) -> Self {
        // ---
        let ext: Option<Extremes> = analysis::extremes(&points);
        SeriesResponse {
            sensor,
            label: sensor.label(),
            window,
            min: ext.map(|e| e.min),
            max: ext.map(|e| e.max),
            points,
        }
    }
}

#[derive(Debug, Serialize)]
struct SensorSummary {
    sensor: Sensor,
    label: &'static str,
    unit: &'static str,
    average: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    rows: usize,
    sensors: Vec<SensorSummary>,
}

async fn summary(State(config): State<Config>) -> Result<Json<SummaryResponse>> {
    // ---
    let path = config.data_path.clone();
    let readings = blocking(move || dataset::load_readings(&path)).await?;
    let averages = analysis::averages(&readings);

    let sensors = Sensor::ALL
        .into_iter()
        .map(|sensor| SensorSummary {
            sensor,
            label: sensor.label(),
            unit: sensor.unit(),
            average: averages[sensor.index()],
        })
        .collect();

    Ok(Json(SummaryResponse {
        rows: readings.len(),
        sensors,
    }))
}

async fn readings(
    State(config): State<Config>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>> {
    // ---
    let sensor = params.sensor()?;
    let path = config.data_path.clone();
    let rows = blocking(move || dataset::load_readings(&path)).await?;

    let window = TimeWindow::resolve(&rows, &params.window())?;
    let filtered = analysis::filter_window(&rows, window);
    let points = analysis::series(filtered.iter().copied(), sensor);

    info!("GET /api/readings - {} points for {}", points.len(), sensor);
    Ok(Json(SeriesResponse::new(sensor, window, points)))
}

#[derive(Debug, Deserialize)]
struct SampleQuery {
    n: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SampleRow {
    timestamp: chrono::NaiveDateTime,
    #[serde(rename = "TC")]
    tc: Option<f64>,
    #[serde(rename = "HUM")]
    hum: Option<f64>,
    #[serde(rename = "PRES")]
    pres: Option<f64>,
    #[serde(rename = "US")]
    us: Option<f64>,
    #[serde(rename = "SOIL1")]
    soil1: Option<f64>,
}

async fn sample(
    State(config): State<Config>,
    Query(params): Query<SampleQuery>,
) -> Result<Json<Vec<SampleRow>>> {
    // ---
    let n = params.n.unwrap_or(config.sample_size);
    let path = config.data_path.clone();
    let picked = blocking(move || {
        let readings = dataset::load_readings(&path)?;
        Ok(analysis::sample(&readings, n, &mut rand::thread_rng()))
    })
    .await?;

    Ok(Json(
        picked
            .into_iter()
            .map(|r| SampleRow {
                timestamp: r.timestamp,
                tc: r.value(Sensor::Tc),
                hum: r.value(Sensor::Hum),
                pres: r.value(Sensor::Pres),
                us: r.value(Sensor::Us),
                soil1: r.value(Sensor::Soil1),
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct DistributionQuery {
    bins: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DistributionResponse {
    sensor: Sensor,
    label: &'static str,
    bins: Vec<Bin>,
}

async fn distribution(
    State(config): State<Config>,
    Path(sensor): Path<String>,
    Query(params): Query<DistributionQuery>,
) -> Result<Json<DistributionResponse>> {
    // ---
    let sensor = parse_sensor(&sensor)?;
    let bins = params.bins.unwrap_or(5);
    if !(1..=analysis::MAX_BINS).contains(&bins) {
        return Err(DashboardError::BadRequest(format!(
            "bins must be between 1 and {}",
            analysis::MAX_BINS
        )));
    }

    let path = config.data_path.clone();
    let readings = blocking(move || dataset::load_readings(&path)).await?;
    let values: Vec<f64> = readings.iter().filter_map(|r| r.value(sensor)).collect();

    Ok(Json(DistributionResponse {
        sensor,
        label: sensor.label(),
        bins: analysis::distribution(&values, bins),
    }))
}
