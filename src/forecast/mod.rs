//! Annual forecast generator.
//!
//! Per sensor, independently: hourly means → IQR trim → seasonal fit →
//! an 8,760-hour cycle (history followed by future hours). The cycle is then
//! repeated across every hour of the target year. The result is persisted
//! once; later calls find the file and skip the work.

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::dataset;
use crate::error::{DashboardError, ForecastError, Result};
use crate::models::{ForecastRecord, Sensor, SensorReading};

pub mod model;
pub mod outliers;
pub mod outlook;
pub mod resample;

pub use model::{ModelSettings, SeasonalModel};
pub use outlook::{outlook, Outlook};

// ---

/// Length of one forecast cycle: the hours of a non-leap year.
pub const CYCLE_HOURS: usize = 8_760;

/// What [`ensure_forecast`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The forecast file already existed and was left untouched.
    Skipped,
    Generated { rows: usize },
}

/// Timestamps the model is evaluated at: the history, then hourly steps after
/// its last point, `CYCLE_HOURS` in total. Longer histories are cut.
pub fn annual_cycle(history: &[NaiveDateTime]) -> Vec<NaiveDateTime> {
    // ---
    let mut cycle: Vec<NaiveDateTime> = history.iter().take(CYCLE_HOURS).copied().collect();
    if let Some(&last) = history.last() {
        let missing = CYCLE_HOURS - cycle.len();
        cycle.extend((1..=missing as i64).map(|h| last + Duration::hours(h)));
    }
    cycle
}

/// Every hour of `year`, from Jan 1 00:00 to Dec 31 23:00. Empty for years
/// chrono cannot represent.
pub fn year_hours(year: i32) -> Vec<NaiveDateTime> {
    // ---
    let start = NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = year
        .checked_add(1)
        .and_then(|next| NaiveDate::from_ymd_opt(next, 1, 1))
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    let hours = (end - start).num_hours();
    (0..hours).map(|h| start + Duration::hours(h)).collect()
}

/// The 8,760-point predicted cycle for one sensor.
pub fn sensor_cycle(
    readings: &[SensorReading],
    sensor: Sensor,
    settings: ModelSettings,
) -> Result<Vec<f64>, ForecastError> {
    // ---
    let hourly = resample::hourly_means(readings, sensor);
    let (cleaned, bounds) = outliers::trim(&hourly);
    match bounds {
        Some(b) => info!(
            "{}: {} hourly points, {} kept inside [{:.3}, {:.3}]",
            sensor,
            hourly.len(),
            cleaned.len(),
            b.lower,
            b.upper
        ),
        None => info!("{}: no hourly points", sensor),
    }

    let model = SeasonalModel::fit(sensor, &cleaned, settings)?;
    let history: Vec<NaiveDateTime> = cleaned.iter().map(|p| p.0).collect();
    Ok(model.predict(&annual_cycle(&history)))
}

/// Forecast every hour of `year` by tiling each sensor's annual cycle.
pub fn generate(
    readings: &[SensorReading],
    year: i32,
    settings: ModelSettings,
) -> Result<Vec<ForecastRecord>, ForecastError> {
    // ---
    let hours = year_hours(year);
    if hours.is_empty() {
        return Err(ForecastError::UnsupportedYear { year });
    }

    let mut cycles: Vec<Vec<f64>> = Vec::with_capacity(Sensor::ALL.len());
    for sensor in Sensor::ALL {
        cycles.push(sensor_cycle(readings, sensor, settings)?);
    }

    let records = hours
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| {
            let mut values = [0.0; 5];
            for (slot, cycle) in values.iter_mut().zip(&cycles) {
                *slot = cycle[i % cycle.len()];
            }
            ForecastRecord { timestamp, values }
        })
        .collect::<Vec<_>>();

    debug!("Tiled {}-hour cycles over {} hours of {}", CYCLE_HOURS, records.len(), year);
    Ok(records)
}

/// Generate the forecast file unless it already exists.
pub fn ensure_forecast(
    data_path: &Path,
    forecast_path: &Path,
    year: i32,
    settings: ModelSettings,
) -> Result<Outcome> {
    // ---
    if forecast_path.exists() {
        debug!("Forecast {} present, skipping generation", forecast_path.display());
        return Ok(Outcome::Skipped);
    }

    info!(
        "Forecast {} missing, generating {} from {}",
        forecast_path.display(),
        year,
        data_path.display()
    );
    let readings = dataset::load_readings(data_path)?;
    let records = generate(&readings, year, settings).map_err(DashboardError::from)?;
    dataset::write_forecast(forecast_path, &records)?;

    info!("Predictions complete, {} rows saved", records.len());
    Ok(Outcome::Generated {
        rows: records.len(),
    })
}
