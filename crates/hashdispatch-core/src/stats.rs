// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Small numeric helpers shared by the policies and aggregators.

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). Fewer than two values yields 0.0.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;

    variance.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in `[0, 100]`.
pub fn percentile(values: &[f64], pct: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(DispatchError::NoData(
            "cannot take a percentile of an empty series".to_owned(),
        ));
    }
    if !(0.0..=100.0).contains(&pct) {
        return Err(DispatchError::InvalidParameter(format!(
            "percentile must be within 0-100, got {pct}"
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "rank is non-negative and bounded by len - 1"
    )]
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Centered rolling mean over a fixed window.
///
/// The window for index `i` ends at `i + (window - 1) / 2` and spans `window`
/// values; positions where it would leave the series are `None`.
pub fn centered_rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    if window == 0 {
        return Err(DispatchError::InvalidParameter(
            "rolling window must be at least one hour".to_owned(),
        ));
    }

    let offset = (window - 1) / 2;
    let n = values.len();

    // Prefix sums keep this linear in the series length
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &value in values {
        let last = prefix.last().copied().unwrap_or(0.0);
        prefix.push(last + value);
    }

    let means = (0..n)
        .map(|i| {
            let end = i + offset;
            if end >= n || end + 1 < window {
                return None;
            }
            let start = end + 1 - window;
            Some((prefix[end + 1] - prefix[start]) / window as f64)
        })
        .collect();

    Ok(means)
}

/// Outlier detection rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Outside `[Q1 - k * IQR, Q3 + k * IQR]`
    Iqr { k: f64 },
    /// Absolute z-score above `z`
    ZScore { z: f64 },
}

impl Default for OutlierMethod {
    fn default() -> Self {
        Self::Iqr { k: 1.5 }
    }
}

/// Flag outliers in a series
pub fn outliers(values: &[f64], method: OutlierMethod) -> Result<Vec<bool>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }

    match method {
        OutlierMethod::Iqr { k } => {
            let q1 = percentile(values, 25.0)?;
            let q3 = percentile(values, 75.0)?;
            let iqr = q3 - q1;
            let lower = q1 - k * iqr;
            let upper = q3 + k * iqr;
            Ok(values.iter().map(|&v| v < lower || v > upper).collect())
        }
        OutlierMethod::ZScore { z } => {
            let std = sample_std(values);
            let mean = mean(values).unwrap_or(0.0);
            if std == 0.0 {
                return Ok(vec![false; values.len()]);
            }
            Ok(values
                .iter()
                .map(|&v| ((v - mean) / std).abs() > z)
                .collect())
        }
    }
}

// Unit conversions

pub fn mw_to_kw(mw: f64) -> f64 {
    mw * 1000.0
}

pub fn th_to_ph(th: f64) -> f64 {
    th / 1_000_000.0
}

pub fn daily_to_hourly(daily: f64) -> f64 {
    daily / 24.0
}
