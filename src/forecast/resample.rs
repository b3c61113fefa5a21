//! Hourly aggregation of raw readings.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};

use crate::models::{Sensor, SensorReading};

// ---

/// Start of the hour containing `ts`.
pub fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts)
}

/// Mean of each hour's present values for one sensor, in time order.
///
/// Hours without a single present value are left out rather than carried as
/// gaps; the regression does not need a regular grid.
pub fn hourly_means(readings: &[SensorReading], sensor: Sensor) -> Vec<(NaiveDateTime, f64)> {
    // ---
    let mut buckets: BTreeMap<NaiveDateTime, (f64, usize)> = BTreeMap::new();
    for reading in readings {
        if let Some(v) = reading.value(sensor) {
            let slot = buckets.entry(floor_to_hour(reading.timestamp)).or_default();
            slot.0 += v;
            slot.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(hour, (sum, count))| (hour, sum / count as f64))
        .collect()
}
