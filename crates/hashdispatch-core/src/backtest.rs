// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Single-window and walk-forward backtests of a dispatch policy.

use chrono::{DateTime, Duration, Utc};
use hashdispatch_types::DispatchRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DispatchError, Result};
use crate::join::DateWindow;
use crate::metrics::{PerformanceMetrics, evaluate};
use crate::policy::DispatchPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(flatten)]
    pub performance: PerformanceMetrics,
    /// First timestamp actually present in the window
    pub backtest_start: DateTime<Utc>,
    /// Last timestamp actually present in the window
    pub backtest_end: DateTime<Utc>,
    /// Whole days between start and end
    pub backtest_days: i64,
    pub data_points: usize,
}

/// Run `policy` over `records`, optionally restricted to `window`
pub fn backtest(
    records: &[DispatchRecord],
    policy: &DispatchPolicy,
    window: Option<&DateWindow>,
) -> Result<BacktestResult> {
    let selected: Vec<DispatchRecord> = match window {
        Some(window) => records
            .iter()
            .filter(|r| window.contains(r.timestamp()))
            .cloned()
            .collect(),
        None => records.to_vec(),
    };

    run_window(&selected, policy)
}

/// One successful window of a rolling backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindowResult {
    pub window_start: DateTime<Utc>,
    /// Exclusive
    pub window_end: DateTime<Utc>,
    #[serde(flatten)]
    pub result: BacktestResult,
}

/// Slide a `window_days` window over the series in `step_days` steps and backtest each.
///
/// Each window is `[start, start + window_days)` and sees only its own records.
/// Windows that fail are logged and skipped; zero successful windows is not an error.
pub fn rolling_backtest(
    records: &[DispatchRecord],
    policy: &DispatchPolicy,
    window_days: u32,
    step_days: u32,
) -> Result<Vec<RollingWindowResult>> {
    roll_windows(records, window_days, step_days, |window| run_window(window, policy))
}

/// Walk the windows and evaluate each with `run`; failures are logged and skipped
fn roll_windows(
    records: &[DispatchRecord],
    window_days: u32,
    step_days: u32,
    mut run: impl FnMut(&[DispatchRecord]) -> Result<BacktestResult>,
) -> Result<Vec<RollingWindowResult>> {
    if window_days == 0 || step_days == 0 {
        return Err(DispatchError::InvalidParameter(format!(
            "rolling window ({window_days} days) and step ({step_days} days) must be positive"
        )));
    }

    let (Some(first), Some(last)) = (
        records.iter().map(DispatchRecord::timestamp).min(),
        records.iter().map(DispatchRecord::timestamp).max(),
    ) else {
        return Err(DispatchError::NoData(
            "no records for rolling backtest".to_owned(),
        ));
    };

    let window = Duration::days(i64::from(window_days));
    let step = Duration::days(i64::from(step_days));

    let mut results = Vec::new();
    let mut skipped = 0_usize;
    let mut current = first;

    while current + window <= last {
        let window_end = current + window;
        let selected: Vec<DispatchRecord> = records
            .iter()
            .filter(|r| r.timestamp() >= current && r.timestamp() < window_end)
            .cloned()
            .collect();

        if !selected.is_empty() {
            match run(&selected) {
                Ok(result) => {
                    debug!(
                        "Window {} .. {}: profit ${:.2}",
                        current, window_end, result.performance.total_profit
                    );
                    results.push(RollingWindowResult {
                        window_start: current,
                        window_end,
                        result,
                    });
                }
                Err(e) => {
                    warn!(
                        "Skipping rolling backtest window {} .. {}: {}",
                        current, window_end, e
                    );
                    skipped += 1;
                }
            }
        }

        current += step;
    }

    info!(
        "Rolling backtest: {} windows of {} days, {} skipped",
        results.len(),
        window_days,
        skipped
    );

    Ok(results)
}

fn run_window(records: &[DispatchRecord], policy: &DispatchPolicy) -> Result<BacktestResult> {
    let (Some(start), Some(end)) = (
        records.iter().map(DispatchRecord::timestamp).min(),
        records.iter().map(DispatchRecord::timestamp).max(),
    ) else {
        return Err(DispatchError::NoData(
            "no data available for the specified date range".to_owned(),
        ));
    };

    let decisions = policy.decide(records)?;
    let performance = evaluate(records, &decisions)?;

    Ok(BacktestResult {
        performance,
        backtest_start: start,
        backtest_end: end,
        backtest_days: (end - start).num_days(),
        data_points: records.len(),
    })
}
