// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! HashDispatch dispatch & profitability engine
//!
//! Estimates the economics of running a Bitcoin mining facility under
//! time-varying electricity prices and hashprice, decides hour by hour whether
//! to run, and summarizes the outcome.
//!
//! ## Features
//!
//! - **Join**: align electricity price and hashprice series on an hourly UTC grid
//! - **Economics**: hashrate, revenue, contract-aware power cost, signed profit
//! - **Policies**: threshold, percentile, rolling-average and peak-avoidance dispatch
//! - **Metrics**: performance, summary, daily risk and ROI aggregates
//! - **Backtests**: fixed windows and walk-forward rolling windows
//!
//! Everything here is synchronous and side-effect free; ingestion, rendering
//! and export live in `hashdispatch-sim`.

pub mod backtest;
pub mod economics;
pub mod error;
pub mod join;
pub mod metrics;
pub mod policy;
pub mod stats;

pub use backtest::{BacktestResult, RollingWindowResult, backtest, rolling_backtest};
pub use economics::{
    hashrate, hourly_electricity_cost, hourly_profit, hourly_revenue, run_dispatch,
    total_hashrate, validate_contract,
};
pub use error::{DispatchError, Result};
pub use join::{DateWindow, join_series};
pub use metrics::{
    PaybackPeriod, PerformanceMetrics, RiskMetrics, RoiMetrics, SummaryStats, evaluate,
    month_name, risk_metrics, roi_metrics, summarize,
};
pub use policy::{
    DispatchPolicy, NamedPolicy, PolicyComparison, PolicyResult, apply_decisions,
    compare_policies, default_policies,
};

pub use hashdispatch_types::*;
