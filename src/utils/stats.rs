//! Scalar statistics over episode returns

use serde::{Deserialize, Serialize};

/// Mean, extremes and (population) standard deviation of a set of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// Largest value
    pub max: f64,
    /// Smallest value
    pub min: f64,
    /// Population standard deviation
    pub std: f64,
    /// Number of values
    pub count: usize,
}

/// Reduce `values` to [`EpochStatistics`]; `None` when empty
pub fn statistics_scalar(values: &[f32]) -> Option<EpochStatistics> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let var = values.iter().map(|&v| (f64::from(v) - mean).powi(2)).sum::<f64>() / n;
    let (min, max) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(f64::from(v)), hi.max(f64::from(v)))
    });

    Some(EpochStatistics { mean, max, min, std: var.sqrt(), count: values.len() })
}
