//! Additive seasonal regression.
//!
//! y(t) = piecewise-linear trend + yearly Fourier series + daily Fourier series
//!
//! Coefficients are the maximum a-posteriori estimate under independent
//! Gaussian priors, which reduces to ridge regression with a per-column
//! penalty `sigma_obs² / prior_scale²`. The observation noise is estimated
//! from a first pass with unit noise, then the system is solved again.

use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use tracing::debug;

use crate::error::ForecastError;
use crate::models::Sensor;

// ---

const SECONDS_PER_DAY: f64 = 86_400.0;
const YEAR_DAYS: f64 = 365.25;
/// Lower bound on the scaled observation variance.
const MIN_NOISE_VARIANCE: f64 = 1e-4;
/// Added to every diagonal entry so the normal equations stay definite.
const JITTER: f64 = 1e-9;

/// Hyperparameters of the seasonal model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub yearly_order: usize,
    pub daily_order: usize,
    pub n_changepoints: usize,
    /// Share of history (from the start) in which changepoints may sit.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub trend_prior_scale: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            yearly_order: 10,
            daily_order: 4,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            trend_prior_scale: 5.0,
        }
    }
}

/// A fitted seasonal model for one sensor.
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    settings: ModelSettings,
    /// Epoch seconds of the first history point.
    t_start: f64,
    /// History span in seconds.
    t_scale: f64,
    y_scale: f64,
    /// Changepoint locations in scaled time.
    changepoints: Vec<f64>,
    beta: Array1<f64>,
}

fn epoch_seconds(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64
}

impl SeasonalModel {
    /// Fit the model to `points` (time-ordered, distinct timestamps).
    pub fn fit(
        sensor: Sensor,
        points: &[(NaiveDateTime, f64)],
        settings: ModelSettings,
    ) -> Result<Self, ForecastError> {
        // ---
        if points.len() < 2 {
            return Err(ForecastError::InsufficientData {
                sensor,
                rows: points.len(),
            });
        }

        let t_start = epoch_seconds(&points[0].0);
        let t_end = epoch_seconds(&points[points.len() - 1].0);
        let t_scale = t_end - t_start;
        if t_scale <= 0.0 {
            return Err(ForecastError::InsufficientData {
                sensor,
                rows: points.len(),
            });
        }

        let y_scale = points
            .iter()
            .map(|p| p.1.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut model = SeasonalModel {
            settings,
            t_start,
            t_scale,
            y_scale,
            changepoints: Vec::new(),
            beta: Array1::zeros(0),
        };
        model.changepoints = model.place_changepoints(points);

        let n = points.len();
        let p = model.n_features();
        let mut x = Array2::<f64>::zeros((n, p));
        let mut y = Array1::<f64>::zeros(n);
        for (i, (ts, v)) in points.iter().enumerate() {
            x.row_mut(i).assign(&Array1::from(model.features(ts)));
            y[i] = v / y_scale;
        }

        let xtx = x.t().dot(&x);
        let xty = x.t().dot(&y);
        let prior_precision = model.prior_precision();

        // First pass with unit noise, to estimate the observation variance
        let beta = solve_ridge(&xtx, &xty, &prior_precision, 1.0)
            .ok_or(ForecastError::Singular { sensor })?;
        let residual = &y - &x.dot(&beta);
        let noise = (residual.dot(&residual) / n as f64).max(MIN_NOISE_VARIANCE);

        model.beta = solve_ridge(&xtx, &xty, &prior_precision, noise)
            .ok_or(ForecastError::Singular { sensor })?;

        debug!(
            "Fitted {} on {} points: {} features, {} changepoints, noise variance {:.3e}",
            sensor,
            n,
            p,
            model.changepoints.len(),
            noise
        );
        Ok(model)
    }

    /// Predicted values at `timestamps`, in the sensor's own units.
    pub fn predict(&self, timestamps: &[NaiveDateTime]) -> Vec<f64> {
        // ---
        timestamps
            .iter()
            .map(|ts| {
                let row = Array1::from(self.features(ts));
                row.dot(&self.beta) * self.y_scale
            })
            .collect()
    }

    fn n_features(&self) -> usize {
        2 + self.changepoints.len()
            + 2 * self.settings.yearly_order
            + 2 * self.settings.daily_order
    }

    fn scaled_time(&self, ts: &NaiveDateTime) -> f64 {
        (epoch_seconds(ts) - self.t_start) / self.t_scale
    }

    /// Evenly spaced over the first `changepoint_range` of the history rows.
    fn place_changepoints(&self, points: &[(NaiveDateTime, f64)]) -> Vec<f64> {
        // ---
        let hist_size = (points.len() as f64 * self.settings.changepoint_range).floor() as usize;
        let count = self.settings.n_changepoints.min(hist_size.saturating_sub(1));
        if count == 0 {
            return Vec::new();
        }
        let last = (hist_size - 1) as f64;
        (1..=count)
            .map(|i| {
                let idx = (last * i as f64 / count as f64).round() as usize;
                self.scaled_time(&points[idx].0)
            })
            .collect()
    }

    /// Design row: intercept, slope, changepoint hinges, yearly, daily terms.
    fn features(&self, ts: &NaiveDateTime) -> Vec<f64> {
        // ---
        let t = self.scaled_time(ts);
        let days = epoch_seconds(ts) / SECONDS_PER_DAY;

        let mut row = Vec::with_capacity(self.n_features());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|c| (t - c).max(0.0)));
        push_fourier(&mut row, days, YEAR_DAYS, self.settings.yearly_order);
        push_fourier(&mut row, days, 1.0, self.settings.daily_order);
        row
    }

    /// Diagonal prior precision, one entry per feature column.
    fn prior_precision(&self) -> Array1<f64> {
        // ---
        let s = &self.settings;
        let mut precision = Vec::with_capacity(self.n_features());
        precision.push(1.0 / s.trend_prior_scale.powi(2));
        precision.push(1.0 / s.trend_prior_scale.powi(2));
        precision.extend(
            std::iter::repeat(1.0 / s.changepoint_prior_scale.powi(2)).take(self.changepoints.len()),
        );
        precision.extend(
            std::iter::repeat(1.0 / s.seasonality_prior_scale.powi(2))
                .take(2 * (s.yearly_order + s.daily_order)),
        );
        Array1::from(precision)
    }
}

fn push_fourier(row: &mut Vec<f64>, days: f64, period: f64, order: usize) {
    // ---
    for k in 1..=order {
        let angle = 2.0 * std::f64::consts::PI * k as f64 * days / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

/// Solve `(XᵀX + noise·diag(precision)) β = Xᵀy`.
fn solve_ridge(
    xtx: &Array2<f64>,
    xty: &Array1<f64>,
    precision: &Array1<f64>,
    noise: f64,
) -> Option<Array1<f64>> {
    // ---
    let mut a = xtx.clone();
    for (i, p) in precision.iter().enumerate() {
        a[[i, i]] += noise * p + JITTER;
    }
    cholesky_solve(&a, xty)
}

/// Solve a symmetric positive-definite system via Cholesky factorization.
///
/// Returns `None` if the matrix is not positive definite.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    // ---
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Some(x)
}
