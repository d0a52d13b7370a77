// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Performance, summary, risk and return figures over dispatched records.
//!
//! Every ratio has an explicit fallback for an empty denominator so that no
//! aggregate ever yields NaN or infinity.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use hashdispatch_types::DispatchRecord;
use serde::{Deserialize, Serialize};

use crate::economics::total_hashrate;
use crate::error::{DispatchError, Result};
use crate::stats::{mean, percentile, sample_std};

const DAYS_PER_YEAR: f64 = 365.25;

/// Outcome of running a set of decisions over a set of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_profit: f64,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub operating_hours: usize,
    pub total_hours: usize,
    pub capacity_factor: f64,
    pub avg_profit_per_operating_hour: f64,
    pub profit_margin: f64,
}

/// Gate each record's economics by the matching decision and aggregate
pub fn evaluate(records: &[DispatchRecord], decisions: &[bool]) -> Result<PerformanceMetrics> {
    ensure_aligned(records, decisions)?;

    let mut total_profit = 0.0;
    let mut total_revenue = 0.0;
    let mut total_cost = 0.0;
    let mut operating_hours = 0_usize;

    for (record, &operate) in records.iter().zip(decisions) {
        if operate {
            total_profit += record.hourly_profit;
            total_revenue += record.hourly_revenue;
            total_cost += record.hourly_electricity_cost;
            operating_hours += 1;
        }
    }

    let total_hours = records.len();
    let capacity_factor = ratio(operating_hours as f64, total_hours as f64);
    let avg_profit_per_operating_hour = ratio(total_profit, operating_hours as f64);
    let profit_margin = if total_revenue > 0.0 {
        total_profit / total_revenue
    } else {
        0.0
    };

    Ok(PerformanceMetrics {
        total_profit,
        total_revenue,
        total_cost,
        operating_hours,
        total_hours,
        capacity_factor,
        avg_profit_per_operating_hour,
        profit_margin,
    })
}

/// Headline figures of a dispatched dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_hours: usize,
    pub operating_hours: usize,
    pub capacity_factor: f64,
    pub total_revenue: f64,
    pub total_electricity_cost: f64,
    pub total_profit: f64,
    pub avg_profit_per_hour: f64,
    /// Over all hours, regardless of dispatch
    pub avg_electricity_price: f64,
    /// Over all hours, regardless of dispatch
    pub avg_hashprice: f64,
    /// Calendar month (1-12) with the highest actual profit
    pub best_month: Option<u32>,
    pub worst_month: Option<u32>,
    /// Hours with strictly positive gross profit
    pub profitable_hours: usize,
    pub unprofitable_hours: usize,
    pub facility_size_mw: f64,
    pub efficiency_w_per_th: f64,
    /// Sum over zones; display only
    pub total_hashrate_th: f64,
}

/// Summarize the stored decisions of `records`
pub fn summarize(records: &[DispatchRecord]) -> Result<SummaryStats> {
    let Some(first) = records.first() else {
        return Err(DispatchError::NoData(
            "cannot summarize an empty dispatch".to_owned(),
        ));
    };

    let total_hours = records.len();
    let operating: Vec<f64> = records
        .iter()
        .filter(|r| r.should_operate)
        .map(|r| r.hourly_profit)
        .collect();
    let operating_hours = operating.len();

    let prices: Vec<f64> = records.iter().map(|r| r.base.electricity_price).collect();
    let hashprices: Vec<f64> = records.iter().map(|r| r.base.hashprice).collect();

    // month -> actual profit, summed across years
    let mut monthly: BTreeMap<u32, f64> = BTreeMap::new();
    for record in records {
        *monthly.entry(record.base.month).or_default() += record.actual_profit;
    }

    let profitable_hours = records.iter().filter(|r| r.hourly_profit > 0.0).count();

    Ok(SummaryStats {
        total_hours,
        operating_hours,
        capacity_factor: ratio(operating_hours as f64, total_hours as f64),
        total_revenue: records.iter().map(|r| r.actual_revenue).sum(),
        total_electricity_cost: records.iter().map(|r| r.actual_cost).sum(),
        total_profit: records.iter().map(|r| r.actual_profit).sum(),
        avg_profit_per_hour: mean(&operating).unwrap_or(0.0),
        avg_electricity_price: mean(&prices).unwrap_or(0.0),
        avg_hashprice: mean(&hashprices).unwrap_or(0.0),
        best_month: extreme_month(&monthly, |candidate, best| candidate > best),
        worst_month: extreme_month(&monthly, |candidate, best| candidate < best),
        profitable_hours,
        unprofitable_hours: total_hours - profitable_hours,
        facility_size_mw: first.facility_size_mw,
        efficiency_w_per_th: first.efficiency_w_per_th,
        total_hashrate_th: total_hashrate(records),
    })
}

/// Daily downside figures for a decision series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Sample standard deviation of daily profit
    pub profit_volatility: f64,
    pub max_daily_loss: f64,
    pub max_daily_gain: f64,
    /// 5th percentile of daily profit
    pub var_95: f64,
    pub risk_adjusted_return: f64,
    pub downside_probability: f64,
    pub negative_days: usize,
    pub total_days: usize,
}

pub fn risk_metrics(records: &[DispatchRecord], decisions: &[bool]) -> Result<RiskMetrics> {
    ensure_aligned(records, decisions)?;
    let daily = daily_profits(records, decisions);
    if daily.is_empty() {
        return Err(DispatchError::NoData(
            "cannot compute risk metrics without records".to_owned(),
        ));
    }

    let volatility = sample_std(&daily);
    let avg_daily = mean(&daily).unwrap_or(0.0);
    let negative_days = daily.iter().filter(|&&p| p < 0.0).count();
    let total_days = daily.len();

    Ok(RiskMetrics {
        profit_volatility: volatility,
        max_daily_loss: daily.iter().copied().fold(f64::INFINITY, f64::min),
        max_daily_gain: daily.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        var_95: percentile(&daily, 5.0)?,
        risk_adjusted_return: if volatility > 0.0 {
            avg_daily / volatility
        } else {
            0.0
        },
        downside_probability: ratio(negative_days as f64, total_days as f64),
        negative_days,
        total_days,
    })
}

/// Time until the investment is recovered at the realised profit rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaybackPeriod {
    Years(f64),
    /// Profit never recovers the investment
    Never,
}

impl std::fmt::Display for PaybackPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Years(years) => write!(f, "{years:.2} years"),
            Self::Never => write!(f, "never"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiMetrics {
    pub initial_investment: f64,
    pub total_profit: f64,
    pub roi_percentage: f64,
    pub annualized_roi: f64,
    pub payback_period: PaybackPeriod,
    pub time_period_years: f64,
}

/// Return on `initial_investment`; `None` when there is no positive investment
pub fn roi_metrics(records: &[DispatchRecord], initial_investment: f64) -> Option<RoiMetrics> {
    if initial_investment <= 0.0 || !initial_investment.is_finite() {
        return None;
    }

    let total_profit: f64 = records.iter().map(|r| r.actual_profit).sum();

    let first = records.iter().map(DispatchRecord::timestamp).min();
    let last = records.iter().map(DispatchRecord::timestamp).max();
    let elapsed_days = first.zip(last).map_or(0, |(first, last)| (last - first).num_days());
    let years = elapsed_days as f64 / DAYS_PER_YEAR;

    let roi_percentage = total_profit / initial_investment * 100.0;
    let annualized_roi = if years > 0.0 {
        roi_percentage / years
    } else {
        0.0
    };
    let payback_period = if total_profit > 0.0 && years > 0.0 {
        PaybackPeriod::Years(initial_investment / (total_profit / years))
    } else {
        PaybackPeriod::Never
    };

    Some(RoiMetrics {
        initial_investment,
        total_profit,
        roi_percentage,
        annualized_roi,
        payback_period,
        time_period_years: years,
    })
}

/// Gated profit summed per UTC calendar day, first to last day inclusive
fn daily_profits(records: &[DispatchRecord], decisions: &[bool]) -> Vec<f64> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (record, &operate) in records.iter().zip(decisions) {
        let day = record.timestamp().date_naive();
        let profit = if operate { record.hourly_profit } else { 0.0 };
        *by_day.entry(day).or_default() += profit;
    }

    let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
        return Vec::new();
    };

    let mut daily = Vec::new();
    let mut day = first;
    while day <= last {
        daily.push(by_day.get(&day).copied().unwrap_or(0.0));
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    daily
}

fn extreme_month(monthly: &BTreeMap<u32, f64>, better: impl Fn(f64, f64) -> bool) -> Option<u32> {
    let mut best: Option<(u32, f64)> = None;
    for (&month, &profit) in monthly {
        match best {
            Some((_, current)) if !better(profit, current) => {}
            Some(_) | None => best = Some((month, profit)),
        }
    }
    best.map(|(month, _)| month)
}

fn ensure_aligned(records: &[DispatchRecord], decisions: &[bool]) -> Result<()> {
    if records.len() != decisions.len() {
        return Err(DispatchError::InvalidParameter(format!(
            "{} decisions for {} records",
            decisions.len(),
            records.len()
        )));
    }
    Ok(())
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// English name of a calendar month (1-12)
pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use hashdispatch_types::HourlyRecord;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn record(hours: i64, revenue: f64, cost: f64) -> DispatchRecord {
        let profit = revenue - cost;
        DispatchRecord {
            base: HourlyRecord::new(start() + Duration::hours(hours), "houston", 40.0, 0.06),
            facility_size_mw: 10.0,
            efficiency_w_per_th: 30.0,
            hashrate_th: 333_333.0,
            hourly_revenue: revenue,
            hourly_electricity_cost: cost,
            hourly_profit: profit,
            should_operate: profit > 0.0,
            actual_revenue: if profit > 0.0 { revenue } else { 0.0 },
            actual_cost: if profit > 0.0 { cost } else { 0.0 },
            actual_profit: if profit > 0.0 { profit } else { 0.0 },
        }
    }

    #[test]
    fn test_evaluate_gates_by_decisions() {
        let records = vec![record(0, 100.0, 40.0), record(1, 100.0, 150.0), record(2, 100.0, 80.0)];
        let metrics = evaluate(&records, &[true, false, true]).unwrap();

        assert!((metrics.total_profit - 80.0).abs() < 1e-9);
        assert!((metrics.total_revenue - 200.0).abs() < 1e-9);
        assert!((metrics.total_cost - 120.0).abs() < 1e-9);
        assert_eq!(metrics.operating_hours, 2);
        assert!((metrics.capacity_factor - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.avg_profit_per_operating_hour - 40.0).abs() < 1e-9);
        assert!((metrics.profit_margin - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_all_idle_has_zero_ratios() {
        let records = vec![record(0, 100.0, 40.0), record(1, 100.0, 150.0)];
        let metrics = evaluate(&records, &[false, false]).unwrap();

        assert_eq!(metrics.total_profit, 0.0);
        assert_eq!(metrics.capacity_factor, 0.0);
        assert_eq!(metrics.avg_profit_per_operating_hour, 0.0);
        assert_eq!(metrics.profit_margin, 0.0);
    }

    #[test]
    fn test_evaluate_rejects_length_mismatch() {
        let records = vec![record(0, 100.0, 40.0)];
        assert!(matches!(
            evaluate(&records, &[true, true]),
            Err(DispatchError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_summarize_counts_market_profitability_independently() {
        let mut records = vec![record(0, 100.0, 40.0), record(1, 100.0, 150.0), record(2, 100.0, 100.0)];
        // Force the profitable hour idle; it still counts as profitable
        records[0] = records[0].with_decision(false);

        let summary = summarize(&records).unwrap();
        assert_eq!(summary.total_hours, 3);
        assert_eq!(summary.operating_hours, 0);
        assert_eq!(summary.profitable_hours, 1);
        assert_eq!(summary.unprofitable_hours, 2);
        assert_eq!(summary.avg_profit_per_hour, 0.0);
        assert!((summary.avg_electricity_price - 40.0).abs() < 1e-9);
        assert_eq!(summary.best_month, Some(1));
        assert!((summary.total_hashrate_th - 333_333.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_empty_fails() {
        assert!(matches!(summarize(&[]), Err(DispatchError::NoData(_))));
    }

    #[test]
    fn test_risk_metrics_fill_missing_days() {
        // Day 1: +60, day 2: nothing, day 3: -50
        let records = vec![record(0, 100.0, 40.0), record(48, 100.0, 150.0)];
        let risk = risk_metrics(&records, &[true, true]).unwrap();

        assert_eq!(risk.total_days, 3);
        assert_eq!(risk.negative_days, 1);
        assert!((risk.max_daily_loss + 50.0).abs() < 1e-9);
        assert!((risk.max_daily_gain - 60.0).abs() < 1e-9);
        assert!((risk.downside_probability - 1.0 / 3.0).abs() < 1e-9);
        // 5th percentile of [60, 0, -50] sorted [-50, 0, 60]: rank 0.1
        assert!((risk.var_95 + 45.0).abs() < 1e-9);
        assert!(risk.profit_volatility > 0.0);
    }

    #[test]
    fn test_risk_metrics_zero_volatility() {
        let records = vec![record(0, 100.0, 40.0)];
        let risk = risk_metrics(&records, &[true]).unwrap();
        assert_eq!(risk.profit_volatility, 0.0);
        assert_eq!(risk.risk_adjusted_return, 0.0);
    }

    #[test]
    fn test_roi_sentinels() {
        let profitable: Vec<_> = (0..=24 * 365).map(|h| record(h, 100.0, 40.0)).collect();
        assert!(roi_metrics(&profitable, 0.0).is_none());
        assert!(roi_metrics(&profitable, -5.0).is_none());

        let roi = roi_metrics(&profitable, 1_000_000.0).unwrap();
        assert!((roi.time_period_years - 365.0 / 365.25).abs() < 1e-9);
        assert!(matches!(roi.payback_period, PaybackPeriod::Years(y) if y > 0.0));

        let losing: Vec<_> = (0..48).map(|h| record(h, 10.0, 40.0)).collect();
        let roi = roi_metrics(&losing, 1_000_000.0).unwrap();
        assert_eq!(roi.payback_period, PaybackPeriod::Never);
        assert_eq!(roi.total_profit, 0.0);

        // No records: a zero-length period, never paid back
        let roi = roi_metrics(&[], 1_000_000.0).unwrap();
        assert_eq!(roi.time_period_years, 0.0);
        assert_eq!(roi.roi_percentage, 0.0);
        assert_eq!(roi.payback_period, PaybackPeriod::Never);
    }
}
