//! Day-level views over the forecast table: today's forecast, the next three
//! days and 3-hour analytics for today.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::models::{ForecastRecord, Sensor};

// ---

pub const OUTLOOK_DAYS: i64 = 3;
pub const ANALYTICS_BUCKET_HOURS: u32 = 3;

pub type SensorValues = BTreeMap<Sensor, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    /// Last forecast row of the day, `None` if the day is not covered.
    pub forecast: Option<SensorValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsBucket {
    pub start: NaiveDateTime,
    pub values: SensorValues,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlook {
    pub date: NaiveDate,
    pub today: Option<SensorValues>,
    pub next_days: Vec<DayForecast>,
    pub analytics: Vec<AnalyticsBucket>,
}

fn values_of(record: &ForecastRecord) -> SensorValues {
    Sensor::ALL
        .into_iter()
        .map(|s| (s, record.value(s)))
        .collect()
}

fn last_of_day(records: &[ForecastRecord], date: NaiveDate) -> Option<&ForecastRecord> {
    records.iter().filter(|r| r.timestamp.date() == date).max_by_key(|r| r.timestamp)
}

/// Build the outlook for `today` from time-ordered forecast rows.
pub fn outlook(records: &[ForecastRecord], today: NaiveDate) -> Outlook {
    // ---
    let next_days = (1..=OUTLOOK_DAYS)
        .map(|offset| {
            let date = today + Duration::days(offset);
            DayForecast {
                date,
                forecast: last_of_day(records, date).map(values_of),
            }
        })
        .collect();

    Outlook {
        date: today,
        today: last_of_day(records, today).map(values_of),
        next_days,
        analytics: analytics(records, today),
    }
}

/// Mean of each sensor over 3-hour buckets of `date`; empty buckets omitted.
pub fn analytics(records: &[ForecastRecord], date: NaiveDate) -> Vec<AnalyticsBucket> {
    // ---
    let mut buckets: BTreeMap<NaiveDateTime, ([f64; 5], usize)> = BTreeMap::new();
    for record in records.iter().filter(|r| r.timestamp.date() == date) {
        let hour = record.timestamp.hour() / ANALYTICS_BUCKET_HOURS * ANALYTICS_BUCKET_HOURS;
        let Some(start) = date.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        let slot = buckets.entry(start).or_insert(([0.0; 5], 0));
        for (sum, v) in slot.0.iter_mut().zip(record.values) {
            *sum += v;
        }
        slot.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(start, (sums, count))| AnalyticsBucket {
            start,
            values: Sensor::ALL
                .into_iter()
                .map(|s| (s, sums[s.index()] / count as f64))
                .collect(),
        })
        .collect()
}
