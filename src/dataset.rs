//! CSV input and output for sensor readings and the forecast table.
//!
//! Readings are loaded fresh for every page view. The forecast table is
//! written once and only read afterwards.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, info, warn};

use crate::error::{DashboardError, Result};
use crate::models::{ForecastRecord, Sensor, SensorReading};

// ---

pub const TIMESTAMP_COLUMN: &str = "timestamp";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a timestamp cell, keeping wall-clock time and dropping any offset.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    // ---
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DashboardError::DataFileMissing {
            path: path.to_path_buf(),
        },
        _ => DashboardError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file))
}

fn column_index(headers: &StringRecord, path: &Path, column: &str) -> Result<usize> {
    // ---
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DashboardError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> DashboardError + '_ {
    move |source| DashboardError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Load the historical sensor CSV.
///
/// Rows come back in timestamp order. Empty or non-numeric sensor cells are
/// missing values and are forward-filled from the previous row of the same
/// column; gaps before the first present value stay `None`.
pub fn load_readings(path: &Path) -> Result<Vec<SensorReading>> {
    // ---
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();

    let ts_idx = column_index(&headers, path, TIMESTAMP_COLUMN)?;
    let mut sensor_idx = [0usize; 5];
    for sensor in Sensor::ALL {
        sensor_idx[sensor.index()] = column_index(&headers, path, sensor.column())?;
    }

    let mut readings = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error(path))?;
        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| DashboardError::Timestamp {
            row: row + 1,
            value: raw_ts.to_string(),
        })?;

        let mut values = [None; 5];
        for (slot, idx) in values.iter_mut().zip(sensor_idx) {
            *slot = record
                .get(idx)
                .and_then(|cell| cell.parse::<f64>().ok())
                .filter(|v| v.is_finite());
        }
        readings.push(SensorReading { timestamp, values });
    }

    readings.sort_by_key(|r| r.timestamp);
    forward_fill(&mut readings);

    debug!("Loaded {} readings from {}", readings.len(), path.display());
    Ok(readings)
}

/// Replace missing values with the last seen value of the same column.
pub fn forward_fill(readings: &mut [SensorReading]) {
    // ---
    let mut last: [Option<f64>; 5] = [None; 5];
    for reading in readings.iter_mut() {
        for (value, prev) in reading.values.iter_mut().zip(last.iter_mut()) {
            match value {
                Some(v) => *prev = Some(*v),
                None => *value = *prev,
            }
        }
    }
}

/// Load a forecast table previously produced by [`write_forecast`].
pub fn load_forecast(path: &Path) -> Result<Vec<ForecastRecord>> {
    // ---
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();

    let ts_idx = column_index(&headers, path, TIMESTAMP_COLUMN)?;
    let mut sensor_idx = [0usize; 5];
    for sensor in Sensor::ALL {
        sensor_idx[sensor.index()] = column_index(&headers, path, sensor.predicted_column())?;
    }

    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error(path))?;
        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| DashboardError::Timestamp {
            row: row + 1,
            value: raw_ts.to_string(),
        })?;

        let mut values = [0.0; 5];
        for sensor in Sensor::ALL {
            let cell = record.get(sensor_idx[sensor.index()]).unwrap_or_default();
            values[sensor.index()] =
                cell.parse::<f64>()
                    .map_err(|_| DashboardError::InvalidValue {
                        row: row + 1,
                        column: sensor.predicted_column().to_string(),
                        value: cell.to_string(),
                    })?;
        }
        records.push(ForecastRecord { timestamp, values });
    }

    records.sort_by_key(|r| r.timestamp);
    Ok(records)
}

/// Write the forecast table.
///
/// Rows are written to a uniquely named sibling file first and then renamed
/// over `path`, so concurrent readers only ever see a complete table. The
/// sibling is removed again if any step fails.
pub fn write_forecast(path: &Path, records: &[ForecastRecord]) -> Result<()> {
    // ---
    let tmp_path = temp_sibling(path);
    let written = write_table(&tmp_path, path, records).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|source| DashboardError::Io {
            path: path.to_path_buf(),
            source,
        })
    });

    if let Err(err) = written {
        if let Err(e) = fs::remove_file(&tmp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", tmp_path.display(), e);
            }
        }
        return Err(err);
    }

    info!("Wrote {} forecast rows to {}", records.len(), path.display());
    Ok(())
}

fn write_table(tmp_path: &Path, path: &Path, records: &[ForecastRecord]) -> Result<()> {
    // ---
    let io_error = |source| DashboardError::Io {
        path: tmp_path.to_path_buf(),
        source,
    };

    let file = File::create(tmp_path).map_err(io_error)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    let mut header = vec![TIMESTAMP_COLUMN];
    header.extend(Sensor::ALL.iter().map(|s| s.predicted_column()));
    writer.write_record(&header).map_err(csv_error(path))?;

    for record in records {
        let mut row = Vec::with_capacity(6);
        row.push(format_timestamp(&record.timestamp));
        row.extend(record.values.iter().map(|v| v.to_string()));
        writer.write_record(&row).map_err(csv_error(path))?;
    }
    writer.flush().map_err(io_error)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    // ---
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "forecast.csv".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}
