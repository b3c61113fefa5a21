//! Interquartile-range outlier trimming.

use serde::Serialize;

// ---

/// Fence multiplier applied to the IQR.
pub const IQR_FENCE: f64 = 1.5;

/// Quantile of an ascending slice with linear interpolation between the two
/// nearest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    // ---
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn contains(&self, v: f64) -> bool {
        self.lower <= v && v <= self.upper
    }
}

pub fn iqr_bounds(values: &[f64]) -> Option<IqrBounds> {
    // ---
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let q1 = quantile(&sorted, 0.25)?;
    let q3 = quantile(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some(IqrBounds {
        q1,
        q3,
        lower: q1 - IQR_FENCE * iqr,
        upper: q3 + IQR_FENCE * iqr,
    })
}

/// Keep the points whose value lies inside the IQR fences (inclusive).
pub fn trim<T: Copy>(points: &[(T, f64)]) -> (Vec<(T, f64)>, Option<IqrBounds>) {
    // ---
    let values: Vec<f64> = points.iter().map(|p| p.1).collect();
    let Some(bounds) = iqr_bounds(&values) else {
        return (Vec::new(), None);
    };
    let kept = points
        .iter()
        .copied()
        .filter(|(_, v)| bounds.contains(*v))
        .collect();
    (kept, Some(bounds))
}
