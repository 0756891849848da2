//! Cross-sectional statistics shared by the ranking, clustering and reporting stages.
//!
//! All helpers work on a batch of companies at once, so their outputs are
//! batch-relative: adding or removing a company changes every scaled value.

/// Compute the mean of a data slice.
///
/// Each term is divided by `n` before summing, so a batch of large finite
/// values does not overflow.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    data.iter().fold(0.0, |acc, x| acc + x / n)
}

/// Mean over the defined, finite entries only. `None` if there are none.
pub fn mean_defined(data: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = data.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    if defined.is_empty() {
        None
    } else {
        Some(mean(&defined))
    }
}

/// Population standard deviation (divides by n), as used for feature scaling.
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Standardize a column to zero mean and unit population variance.
/// A constant column maps to all zeros.
///
/// The column is first divided by its largest magnitude; z-scores do not
/// depend on scale, and this keeps the squared deviations finite.
pub fn z_scores(data: &[f64]) -> Vec<f64> {
    let scale = data
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let scaled: Vec<f64> = if scale > 0.0 {
        data.iter().map(|x| x / scale).collect()
    } else {
        data.to_vec()
    };

    let m = mean(&scaled);
    let sd = population_std_dev(&scaled);
    if sd < f64::EPSILON {
        return vec![0.0; data.len()];
    }
    scaled.iter().map(|x| (x - m) / sd).collect()
}

/// Min-max scale a column to `[0, 1]`.
///
/// Undefined entries scale to 0 and do not take part in the min/max. When
/// every defined value is equal (a batch of one included) they all scale to 0.
pub fn min_max_scale(data: &[Option<f64>]) -> Vec<f64> {
    let defined = data.iter().flatten().copied().filter(|v| v.is_finite());
    let (min, max) = defined.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;

    data.iter()
        .map(|value| match value {
            Some(v) if v.is_finite() && range > f64::EPSILON => (v - min) / range,
            _ => 0.0,
        })
        .collect()
}
