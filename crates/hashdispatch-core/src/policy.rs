// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Dispatch policies and the comparison driver.
//!
//! A policy maps a slice of dispatched records to one operate/idle decision per
//! record. The percentile, rolling-average and peak-avoidance policies read the
//! whole supplied window (including future hours), so they are retrospective
//! tools for backtesting and cannot drive live dispatch as-is.

use std::fmt;

use hashdispatch_types::{DispatchRecord, ModelConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::metrics::{PerformanceMetrics, evaluate};
use crate::stats::{centered_rolling_mean, percentile};

/// Percentile a peak hour's profit must beat to run anyway
const PEAK_OVERRIDE_PERCENTILE: f64 = 75.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Operate iff hourly profit exceeds `threshold`
    Threshold { threshold: f64 },

    /// Operate iff hourly profit exceeds the given percentile (0-100) of the window's profits
    Percentile { percentile: f64 },

    /// Operate iff hourly profit exceeds `multiplier` times the centered rolling mean
    RollingAverage { window_hours: usize, multiplier: f64 },

    /// Operate on profitable hours outside `peak_hours`; peak hours need a
    /// profit above the window's 75th percentile
    PeakAvoidance { peak_hours: Vec<u32> },
}

impl DispatchPolicy {
    /// Decide for every record. The result has the same length and order as `records`.
    pub fn decide(&self, records: &[DispatchRecord]) -> Result<Vec<bool>> {
        let profits: Vec<f64> = records.iter().map(|r| r.hourly_profit).collect();

        match self {
            Self::Threshold { threshold } => Ok(profits.iter().map(|&p| p > *threshold).collect()),

            Self::Percentile { percentile: pct } => {
                let cutoff = percentile(&profits, *pct)?;
                Ok(profits.iter().map(|&p| p > cutoff).collect())
            }

            Self::RollingAverage {
                window_hours,
                multiplier,
            } => {
                let rolling = centered_rolling_mean(&profits, *window_hours)?;
                Ok(profits
                    .iter()
                    .zip(rolling)
                    .map(|(&p, avg)| avg.is_some_and(|avg| p > avg * multiplier))
                    .collect())
            }

            Self::PeakAvoidance { peak_hours } => {
                let high = percentile(&profits, PEAK_OVERRIDE_PERCENTILE)?;
                Ok(records
                    .iter()
                    .map(|r| {
                        let is_peak = peak_hours.contains(&r.base.hour);
                        (r.hourly_profit > 0.0 && !is_peak) || r.hourly_profit > high
                    })
                    .collect())
            }
        }
    }

    /// Short human-readable description
    pub fn label(&self) -> String {
        match self {
            Self::Threshold { threshold } => format!("profit > ${threshold:.2}/h"),
            Self::Percentile { percentile } => format!("profit above P{percentile:.0}"),
            Self::RollingAverage {
                window_hours,
                multiplier,
            } => format!("profit > {multiplier:.2} x {window_hours}h centered mean"),
            Self::PeakAvoidance { peak_hours } => {
                let hours: Vec<String> = peak_hours.iter().map(u32::to_string).collect();
                format!("avoid peak hours [{}] unless above P75", hours.join(","))
            }
        }
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A policy with the display name it is compared under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPolicy {
    pub name: String,
    #[serde(flatten)]
    pub policy: DispatchPolicy,
}

impl NamedPolicy {
    pub fn new(name: impl Into<String>, policy: DispatchPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }
}

/// The standard comparison set
pub fn default_policies(config: &ModelConfig) -> Vec<NamedPolicy> {
    vec![
        NamedPolicy::new(
            "Simple Threshold",
            DispatchPolicy::Threshold {
                threshold: config.mining.default_min_profit_threshold,
            },
        ),
        NamedPolicy::new(
            "Percentile 60%",
            DispatchPolicy::Percentile { percentile: 60.0 },
        ),
        NamedPolicy::new(
            "Percentile 70%",
            DispatchPolicy::Percentile { percentile: 70.0 },
        ),
        NamedPolicy::new(
            "Rolling Average",
            DispatchPolicy::RollingAverage {
                window_hours: config.dispatch.rolling_average_window_hours,
                multiplier: config.dispatch.rolling_average_multiplier,
            },
        ),
        NamedPolicy::new(
            "Avoid Peak Hours",
            DispatchPolicy::PeakAvoidance {
                peak_hours: config.dispatch.peak_hours.clone(),
            },
        ),
    ]
}

/// Replace the stored decisions of `records` with `decisions`
pub fn apply_decisions(records: &[DispatchRecord], decisions: &[bool]) -> Result<Vec<DispatchRecord>> {
    if records.len() != decisions.len() {
        return Err(DispatchError::InvalidParameter(format!(
            "{} decisions for {} records",
            decisions.len(),
            records.len()
        )));
    }
    Ok(records
        .iter()
        .zip(decisions)
        .map(|(record, &operate)| record.with_decision(operate))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub name: String,
    pub policy: DispatchPolicy,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyComparison {
    /// Index into `results` of the highest total profit
    pub best: usize,
    /// In the order the policies were given
    pub results: Vec<PolicyResult>,
}

impl PolicyComparison {
    pub fn best_result(&self) -> Option<&PolicyResult> {
        self.results.get(self.best)
    }
}

/// Evaluate every policy over the same records and pick the highest total profit.
///
/// The first policy wins ties.
pub fn compare_policies(
    records: &[DispatchRecord],
    policies: &[NamedPolicy],
) -> Result<PolicyComparison> {
    if policies.is_empty() {
        return Err(DispatchError::InvalidParameter(
            "no policies to compare".to_owned(),
        ));
    }

    let mut results = Vec::with_capacity(policies.len());
    let mut best = 0;
    let mut best_profit = f64::NEG_INFINITY;

    for (index, named) in policies.iter().enumerate() {
        let decisions = named.policy.decide(records)?;
        let performance = evaluate(records, &decisions)?;
        debug!(
            "Policy '{}': profit ${:.2}, capacity factor {:.1}%",
            named.name,
            performance.total_profit,
            performance.capacity_factor * 100.0
        );

        if performance.total_profit > best_profit {
            best_profit = performance.total_profit;
            best = index;
        }
        results.push(PolicyResult {
            name: named.name.clone(),
            policy: named.policy.clone(),
            performance,
        });
    }

    info!(
        "Best policy: {} (${:.2})",
        results[best].name, best_profit
    );

    Ok(PolicyComparison { best, results })
}
