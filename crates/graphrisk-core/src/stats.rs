//! Descriptive statistics shared by the detectors.

/// Which denominator to use for the variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispersion {
    /// Divide by `n`.
    Population,
    /// Divide by `n - 1` (Bessel's correction).
    Sample,
}

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Variance under the given dispersion, `None` if there are too few values.
#[must_use]
pub fn variance(values: &[f64], dispersion: Dispersion) -> Option<f64> {
    let m = mean(values)?;
    let denom = match dispersion {
        Dispersion::Population => values.len(),
        Dispersion::Sample => values.len().checked_sub(1).filter(|d| *d > 0)?,
    };
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(sum_sq / denom as f64)
}

/// Coefficient of variation (`std / mean`).
///
/// Returns `None` for an empty slice or a zero mean; callers decide what those
/// cases score.
#[must_use]
pub fn coefficient_of_variation(values: &[f64], dispersion: Dispersion) -> Option<f64> {
    let m = mean(values)?;
    if m == 0.0 {
        return None;
    }
    let var = variance(values, dispersion)?;
    Some(var.sqrt() / m.abs())
}

/// Clamp to the unit interval, mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// `min(value / ceiling, 1)`, or 0 when the ceiling is not positive.
#[must_use]
pub fn normalize(value: f64, ceiling: f64) -> f64 {
    if ceiling > 0.0 {
        clamp_unit(value / ceiling)
    } else {
        0.0
    }
}
