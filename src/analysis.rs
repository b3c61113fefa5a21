//! Computations behind the dashboard pages: time-window filtering, per-sensor
//! series and extremes, pie-chart binning, correlation and sampling.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};
use crate::models::{Sensor, SensorReading, SeriesPoint, TimedRow};

// ---

/// Date/time selection coming from the page sidebar.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Only honoured when `start_date == end_date`.
    pub start_time: Option<NaiveTime>,
    /// Only honoured when `start_date == end_date`.
    pub end_time: Option<NaiveTime>,
}

/// Inclusive timestamp range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Resolve a sidebar selection against the loaded rows.
    ///
    /// Missing dates default to the first and last row's date. The
    /// time-of-day bounds default to the time components of the first and
    /// last rows; a user may narrow them only for a single-day selection.
    /// Returns `None` when there are no rows to window.
    pub fn resolve<R: TimedRow>(rows: &[R], query: &WindowQuery) -> Result<Option<TimeWindow>> {
        // ---
        let first = rows.iter().map(TimedRow::timestamp).min();
        let last = rows.iter().map(TimedRow::timestamp).max();
        let (Some(first), Some(last)) = (first, last) else {
            return Ok(None);
        };

        let start_date = query.start_date.unwrap_or(first.date());
        let end_date = query.end_date.unwrap_or(last.date());

        let (start_time, end_time) = if start_date == end_date {
            (
                query.start_time.unwrap_or(first.time()),
                query.end_time.unwrap_or(last.time()),
            )
        } else {
            (first.time(), last.time())
        };

        let window = TimeWindow {
            start: start_date.and_time(start_time),
            end: end_date.and_time(end_time),
        };
        if window.start > window.end {
            return Err(DashboardError::BadRequest(format!(
                "Start {} is after end {}",
                window.start, window.end
            )));
        }
        Ok(Some(window))
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Rows inside `window`, in input order.
pub fn filter_window<'a, R: TimedRow>(rows: &'a [R], window: Option<TimeWindow>) -> Vec<&'a R> {
    // ---
    match window {
        Some(w) => rows.iter().filter(|r| w.contains(r.timestamp())).collect(),
        None => Vec::new(),
    }
}

/// Chart points for one sensor, skipping missing values.
pub fn series<'a, R, I>(rows: I, sensor: Sensor) -> Vec<SeriesPoint>
where
    R: TimedRow + 'a,
    I: IntoIterator<Item = &'a R>,
{
    rows.into_iter()
        .filter_map(|r| {
            r.sensor_value(sensor).map(|value| SeriesPoint {
                timestamp: r.timestamp(),
                value,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremes {
    pub min: f64,
    pub max: f64,
}

pub fn extremes(points: &[SeriesPoint]) -> Option<Extremes> {
    // ---
    let mut iter = points.iter().map(|p| p.value);
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(Extremes { min, max })
}

/// Mean of each sensor's present values, `None` for an all-missing column.
pub fn averages(readings: &[SensorReading]) -> [Option<f64>; 5] {
    // ---
    let mut sums = [0.0; 5];
    let mut counts = [0usize; 5];
    for reading in readings {
        for sensor in Sensor::ALL {
            if let Some(v) = reading.value(sensor) {
                sums[sensor.index()] += v;
                counts[sensor.index()] += 1;
            }
        }
    }
    let mut out = [None; 5];
    for i in 0..5 {
        if counts[i] > 0 {
            out[i] = Some(sums[i] / counts[i] as f64);
        }
    }
    out
}

/// One slice of a pie chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    /// Right-closed interval label, e.g. `(12.345, 15.000]`.
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub percent: f64,
}

/// Largest bin count [`distribution`] will produce.
pub const MAX_BINS: usize = 100;

/// Equal-width binning over the value range.
///
/// The lowest edge is pushed down by 0.1 % of the range so the minimum lands
/// in the first bin; a constant series is widened by 0.1 % on both sides.
/// `bins` is clamped to `1..=MAX_BINS`.
pub fn distribution(values: &[f64], bins: usize) -> Vec<Bin> {
    // ---
    let bins = bins.clamp(1, MAX_BINS);
    let Some(mut lo) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let mut hi = values.iter().copied().fold(lo, f64::max);

    let mut edges: Vec<f64>;
    if lo == hi {
        let pad = if lo == 0.0 { 0.001 } else { 0.001 * lo.abs() };
        lo -= pad;
        hi += pad;
        edges = linspace(lo, hi, bins + 1);
    } else {
        edges = linspace(lo, hi, bins + 1);
        edges[0] -= (hi - lo) * 0.001;
    }

    let mut counts = vec![0usize; bins];
    for &v in values {
        // First edge strictly below v, bins are (edge[i], edge[i + 1]]
        let idx = edges[1..].partition_point(|&e| e < v).min(bins - 1);
        counts[idx] += 1;
    }

    let total = values.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            label: format!("({:.3}, {:.3}]", edges[i], edges[i + 1]),
            lower: edges[i],
            upper: edges[i + 1],
            count,
            percent: count as f64 * 100.0 / total,
        })
        .collect()
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    // ---
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

/// Pearson coefficients between every pair of sensors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub sensors: Vec<Sensor>,
    /// Row-major, `None` where the coefficient is undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Sensor, b: Sensor) -> Option<f64> {
        self.values[a.index()][b.index()]
    }
}

pub fn correlation_matrix(readings: &[SensorReading]) -> CorrelationMatrix {
    // ---
    let mut values = vec![vec![None; 5]; 5];
    for a in Sensor::ALL {
        for b in Sensor::ALL {
            if b.index() < a.index() {
                values[a.index()][b.index()] = values[b.index()][a.index()];
                continue;
            }
            let pairs: Vec<(f64, f64)> = readings
                .iter()
                .filter_map(|r| Some((r.value(a)?, r.value(b)?)))
                .collect();
            values[a.index()][b.index()] = pearson(&pairs);
        }
    }
    CorrelationMatrix {
        sensors: Sensor::ALL.to_vec(),
        values,
    }
}

/// Pearson correlation over pairwise-complete observations.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    // ---
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Plain-language strength of a correlation coefficient.
pub fn explain_correlation(r: f64) -> &'static str {
    // ---
    let r = r.abs();
    if r < 0.2 {
        "Very weak or no correlation."
    } else if r <= 0.4 {
        "Weak correlation."
    } else if r <= 0.6 {
        "Moderate correlation."
    } else if r <= 0.8 {
        "Strong correlation."
    } else {
        "Very strong correlation."
    }
}

/// Uniform random sample without replacement, returned in timestamp order.
pub fn sample<G: Rng + ?Sized>(readings: &[SensorReading], n: usize, rng: &mut G) -> Vec<SensorReading> {
    // ---
    if readings.len() <= n {
        return readings.to_vec();
    }
    let mut picked = rand::seq::index::sample(rng, readings.len(), n).into_vec();
    picked.sort_unstable();
    let mut out: Vec<SensorReading> = picked.into_iter().map(|i| readings[i].clone()).collect();
    out.sort_by_key(|r| r.timestamp);
    out
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::Duration;
    use rand::{rngs::StdRng, SeedableRng};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn reading(at: NaiveDateTime, tc: f64, hum: f64) -> SensorReading {
        // ---
        SensorReading {
            timestamp: at,
            values: [Some(tc), Some(hum), Some(1010.0), None, Some(30.0)],
        }
    }

    fn hourly(start: &str, hours: i64) -> Vec<SensorReading> {
        // ---
        let start = ts(start);
        (0..hours)
            .map(|h| reading(start + Duration::hours(h), h as f64, 100.0 - h as f64))
            .collect()
    }

    #[test]
    fn test_window_defaults_cover_everything() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 72);
        let window = TimeWindow::resolve(&rows, &WindowQuery::default())
            .unwrap()
            .unwrap();
        assert_eq!(window.start, ts("2023-03-01 00:00:00"));
        assert_eq!(window.end, ts("2023-03-03 23:00:00"));
        assert_eq!(filter_window(&rows, Some(window)).len(), 72);
    }

    #[test]
    fn test_same_day_selection_uses_hours() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 72);
        let day = NaiveDate::from_ymd_opt(2023, 3, 2).unwrap();
        let query = WindowQuery {
            start_date: Some(day),
            end_date: Some(day),
            start_time: NaiveTime::from_hms_opt(6, 0, 0),
            end_time: NaiveTime::from_hms_opt(9, 0, 0),
        };
        let window = TimeWindow::resolve(&rows, &query).unwrap();
        let picked = filter_window(&rows, window);
        assert_eq!(picked.len(), 4);
        assert_eq!(picked[0].timestamp, ts("2023-03-02 06:00:00"));
    }

    #[test]
    fn test_multi_day_selection_ignores_hours() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 72);
        let query = WindowQuery {
            start_date: NaiveDate::from_ymd_opt(2023, 3, 2),
            end_date: NaiveDate::from_ymd_opt(2023, 3, 3),
            start_time: NaiveTime::from_hms_opt(12, 0, 0),
            end_time: NaiveTime::from_hms_opt(13, 0, 0),
        };
        let window = TimeWindow::resolve(&rows, &query).unwrap();
        assert_eq!(filter_window(&rows, window).len(), 48);
    }

    #[test]
    fn test_inverted_window_rejected() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 72);
        let query = WindowQuery {
            start_date: NaiveDate::from_ymd_opt(2023, 3, 3),
            end_date: NaiveDate::from_ymd_opt(2023, 3, 1),
            ..Default::default()
        };
        assert!(matches!(
            TimeWindow::resolve(&rows, &query),
            Err(DashboardError::BadRequest(_))
        ));
        let empty: Vec<SensorReading> = Vec::new();
        assert_eq!(TimeWindow::resolve(&empty, &query).unwrap(), None);
    }

    #[test]
    fn test_series_and_extremes() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 10);
        let points = series(&rows, Sensor::Tc);
        assert_eq!(points.len(), 10);
        assert_eq!(
            extremes(&points),
            Some(Extremes { min: 0.0, max: 9.0 })
        );
        // US is missing everywhere
        assert!(series(&rows, Sensor::Us).is_empty());
        assert_eq!(extremes(&[]), None);
    }

    #[test]
    fn test_averages() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 5);
        let avg = averages(&rows);
        assert_eq!(avg[Sensor::Tc.index()], Some(2.0));
        assert_eq!(avg[Sensor::Hum.index()], Some(98.0));
        assert_eq!(avg[Sensor::Us.index()], None);
    }

    #[test]
    fn test_distribution_five_bins() {
        // ---
        let values: Vec<f64> = (0..=10).map(f64::from).collect();
        let bins = distribution(&values, 5);
        assert_eq!(bins.len(), 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 11);
        // (-0.01, 2] holds 0, 1, 2
        assert_eq!(bins[0].count, 3);
        assert_eq!(bins[1].count, 2);
        assert_eq!(bins[4].count, 2);
        assert!((bins[0].lower + 0.01).abs() < 1e-12);
        assert_eq!(bins[4].upper, 10.0);
        assert_eq!(bins[0].label, "(-0.010, 2.000]");
        let total: f64 = bins.iter().map(|b| b.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_distribution_constant_and_empty() {
        // ---
        let bins = distribution(&[5.0, 5.0, 5.0], 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
        assert!(bins[0].lower < 5.0 && bins[4].upper > 5.0);
        assert!(distribution(&[], 5).is_empty());
    }

    #[test]
    fn test_distribution_bin_count_is_clamped() {
        // ---
        let values = [1.0, 2.0, 3.0];
        assert_eq!(distribution(&values, usize::MAX).len(), MAX_BINS);
        assert_eq!(distribution(&values, 1 << 42).len(), MAX_BINS);
        assert_eq!(distribution(&values, 0).len(), 1);
    }

    #[test]
    fn test_correlation() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 24);
        let matrix = correlation_matrix(&rows);
        let r = matrix.get(Sensor::Tc, Sensor::Hum).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
        assert!((matrix.get(Sensor::Tc, Sensor::Tc).unwrap() - 1.0).abs() < 1e-12);
        // Constant pressure has no defined correlation
        assert_eq!(matrix.get(Sensor::Pres, Sensor::Tc), None);
        assert_eq!(matrix.get(Sensor::Us, Sensor::Tc), None);
        assert_eq!(
            matrix.get(Sensor::Hum, Sensor::Tc),
            matrix.get(Sensor::Tc, Sensor::Hum)
        );
    }

    #[test]
    fn test_explain_correlation_thresholds() {
        // ---
        assert_eq!(explain_correlation(0.1), "Very weak or no correlation.");
        assert_eq!(explain_correlation(-0.2), "Weak correlation.");
        assert_eq!(explain_correlation(0.4), "Weak correlation.");
        assert_eq!(explain_correlation(0.55), "Moderate correlation.");
        assert_eq!(explain_correlation(-0.8), "Strong correlation.");
        assert_eq!(explain_correlation(0.95), "Very strong correlation.");
    }

    #[test]
    fn test_sample_is_ordered_subset() {
        // ---
        let rows = hourly("2023-03-01 00:00:00", 500);
        let mut rng = StdRng::seed_from_u64(7);
        let picked = sample(&rows, 50, &mut rng);
        assert_eq!(picked.len(), 50);
        assert!(picked.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        assert_eq!(sample(&rows[..10], 50, &mut rng).len(), 10);
    }
}
