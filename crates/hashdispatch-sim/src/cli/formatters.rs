// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Output formatters for CLI results.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL};
use hashdispatch_core::{
    BacktestResult, DispatchRecord, ModelConfig, PolicyComparison, RiskMetrics,
    RollingWindowResult, RoiMetrics, SummaryStats, month_name, stats::th_to_ph,
};
use serde::Serialize;

/// Formatter for pretty tables
#[derive(Debug)]
pub struct TableFormatter;

/// Formatter for CSV export
#[derive(Debug)]
pub struct CsvFormatter;

/// Formatter for JSON export
#[derive(Debug)]
pub struct JsonFormatter;

/// `$1,234.56`
pub fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{cents}")
}

/// Ratio as percentage, `0.25` -> `25.0%`
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Large number with K/M/B suffix
pub fn format_large_number(number: f64) -> String {
    let magnitude = number.abs();
    if magnitude >= 1e9 {
        format!("{:.1}B", number / 1e9)
    } else if magnitude >= 1e6 {
        format!("{:.1}M", number / 1e6)
    } else if magnitude >= 1e3 {
        format!("{:.1}K", number / 1e3)
    } else {
        format!("{number:.1}")
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn key_value_table(rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header(&["Metric", "Value"]));
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}

fn profit_cell(value: f64) -> Cell {
    let cell = Cell::new(format_currency(value));
    if value < 0.0 {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

impl TableFormatter {
    /// Headline summary of a dispatch run
    pub fn format_summary(summary: &SummaryStats, config: &ModelConfig) -> String {
        let month = |m: Option<u32>| m.map_or_else(|| "-".to_owned(), |m| month_name(m).to_owned());
        let electricity_unit = &config.mining.electricity_price_unit;
        let hashprice_unit = &config.mining.hashprice_unit;

        let table = key_value_table(vec![
            ("Facility size (first zone)", format!("{:.1} MW", summary.facility_size_mw)),
            ("Efficiency", format!("{:.1} W/TH", summary.efficiency_w_per_th)),
            (
                "Total hashrate",
                format!(
                    "{} TH/s ({:.2} PH/s)",
                    format_large_number(summary.total_hashrate_th),
                    th_to_ph(summary.total_hashrate_th)
                ),
            ),
            ("Total hours", summary.total_hours.to_string()),
            ("Operating hours", summary.operating_hours.to_string()),
            ("Capacity factor", format_percentage(summary.capacity_factor)),
            ("Total revenue", format_currency(summary.total_revenue)),
            ("Total electricity cost", format_currency(summary.total_electricity_cost)),
            ("Total profit", format_currency(summary.total_profit)),
            ("Avg profit / operating hour", format_currency(summary.avg_profit_per_hour)),
            (
                "Avg electricity price",
                format!("{:.2} {electricity_unit}", summary.avg_electricity_price),
            ),
            ("Avg hashprice", format!("{:.4} {hashprice_unit}", summary.avg_hashprice)),
            ("Best month", month(summary.best_month)),
            ("Worst month", month(summary.worst_month)),
            ("Profitable hours", summary.profitable_hours.to_string()),
            ("Unprofitable hours", summary.unprofitable_hours.to_string()),
        ]);

        format!("{table}\n")
    }

    pub fn format_risk(risk: &RiskMetrics) -> String {
        let table = key_value_table(vec![
            ("Daily profit volatility", format_currency(risk.profit_volatility)),
            ("Worst day", format_currency(risk.max_daily_loss)),
            ("Best day", format_currency(risk.max_daily_gain)),
            ("VaR 95% (daily)", format_currency(risk.var_95)),
            ("Risk-adjusted return", format!("{:.3}", risk.risk_adjusted_return)),
            (
                "Negative days",
                format!("{} / {}", risk.negative_days, risk.total_days),
            ),
            ("Downside probability", format_percentage(risk.downside_probability)),
        ]);
        format!("{table}\n")
    }

    pub fn format_roi(roi: &RoiMetrics) -> String {
        let table = key_value_table(vec![
            ("Initial investment", format_currency(roi.initial_investment)),
            ("Total profit", format_currency(roi.total_profit)),
            ("Period", format!("{:.2} years", roi.time_period_years)),
            ("ROI", format!("{:.2}%", roi.roi_percentage)),
            ("Annualized ROI", format!("{:.2}%", roi.annualized_roi)),
            ("Payback period", roi.payback_period.to_string()),
        ]);
        format!("{table}\n")
    }

    /// Policy comparison, best policy highlighted
    pub fn format_comparison(comparison: &PolicyComparison) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(header(&[
            "Policy",
            "Rule",
            "Total Profit",
            "Revenue",
            "Cost",
            "Operating\nHours",
            "Capacity\nFactor",
            "Avg Profit /\nOp. Hour",
            "Margin",
        ]));

        for (index, result) in comparison.results.iter().enumerate() {
            let performance = &result.performance;
            let name_cell = if index == comparison.best {
                Cell::new(&result.name)
                    .fg(Color::Green)
                    .add_attribute(Attribute::Bold)
            } else {
                Cell::new(&result.name)
            };

            table.add_row(vec![
                name_cell,
                Cell::new(result.policy.label()),
                profit_cell(performance.total_profit),
                Cell::new(format_currency(performance.total_revenue)),
                Cell::new(format_currency(performance.total_cost)),
                Cell::new(format!(
                    "{} / {}",
                    performance.operating_hours, performance.total_hours
                )),
                Cell::new(format_percentage(performance.capacity_factor)),
                Cell::new(format_currency(performance.avg_profit_per_operating_hour)),
                Cell::new(format_percentage(performance.profit_margin)),
            ]);
        }

        let mut output = format!("{table}\n");
        if let Some(best) = comparison.best_result() {
            output.push_str(&format!(
                "Best policy: {} ({})\n",
                best.name,
                format_currency(best.performance.total_profit)
            ));
        }
        output
    }

    pub fn format_backtest(name: &str, result: &BacktestResult) -> String {
        let performance = &result.performance;
        let table = key_value_table(vec![
            ("Policy", name.to_owned()),
            ("Start", result.backtest_start.to_rfc3339()),
            ("End", result.backtest_end.to_rfc3339()),
            ("Days", result.backtest_days.to_string()),
            ("Data points", result.data_points.to_string()),
            ("Total profit", format_currency(performance.total_profit)),
            ("Capacity factor", format_percentage(performance.capacity_factor)),
            (
                "Avg profit / operating hour",
                format_currency(performance.avg_profit_per_operating_hour),
            ),
            ("Profit margin", format_percentage(performance.profit_margin)),
        ]);
        format!("{table}\n")
    }

    /// One row per rolling window
    pub fn format_rolling(name: &str, windows: &[RollingWindowResult]) -> String {
        if windows.is_empty() {
            return format!("No rolling windows completed for {name}\n");
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(header(&[
            "Window Start",
            "Window End",
            "Hours",
            "Total Profit",
            "Capacity\nFactor",
            "Margin",
        ]));

        for window in windows {
            let performance = &window.result.performance;
            table.add_row(vec![
                Cell::new(window.window_start.format("%Y-%m-%d").to_string()),
                Cell::new(window.window_end.format("%Y-%m-%d").to_string()),
                Cell::new(window.result.data_points.to_string()),
                profit_cell(performance.total_profit),
                Cell::new(format_percentage(performance.capacity_factor)),
                Cell::new(format_percentage(performance.profit_margin)),
            ]);
        }

        let profits: Vec<f64> = windows
            .iter()
            .map(|w| w.result.performance.total_profit)
            .collect();
        let mean = hashdispatch_core::stats::mean(&profits).unwrap_or(0.0);
        let spread = hashdispatch_core::stats::sample_std(&profits);

        format!(
            "{table}\n{name}: {} windows, mean profit {} (std {})\n",
            windows.len(),
            format_currency(mean),
            format_currency(spread)
        )
    }
}

/// Flat row written for each dispatched hour
#[derive(Debug, Serialize)]
struct DispatchRow<'a> {
    timestamp: DateTime<Utc>,
    load_zone: &'a str,
    hour: u32,
    day_of_week: u32,
    month: u32,
    electricity_price: f64,
    hashprice: f64,
    facility_size_mw: f64,
    hashrate_th: f64,
    hourly_revenue: f64,
    hourly_electricity_cost: f64,
    hourly_profit: f64,
    should_operate: bool,
    actual_revenue: f64,
    actual_cost: f64,
    actual_profit: f64,
}

impl<'a> From<&'a DispatchRecord> for DispatchRow<'a> {
    fn from(record: &'a DispatchRecord) -> Self {
        Self {
            timestamp: record.base.timestamp,
            load_zone: &record.base.load_zone,
            hour: record.base.hour,
            day_of_week: record.base.day_of_week,
            month: record.base.month,
            electricity_price: record.base.electricity_price,
            hashprice: record.base.hashprice,
            facility_size_mw: record.facility_size_mw,
            hashrate_th: record.hashrate_th,
            hourly_revenue: record.hourly_revenue,
            hourly_electricity_cost: record.hourly_electricity_cost,
            hourly_profit: record.hourly_profit,
            should_operate: record.should_operate,
            actual_revenue: record.actual_revenue,
            actual_cost: record.actual_cost,
            actual_profit: record.actual_profit,
        }
    }
}

#[derive(Debug, Serialize)]
struct RollingRow {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    data_points: usize,
    total_profit: f64,
    total_revenue: f64,
    total_cost: f64,
    operating_hours: usize,
    capacity_factor: f64,
    profit_margin: f64,
}

impl CsvFormatter {
    /// Export hour-by-hour dispatch to CSV
    pub fn write_dispatch(records: &[DispatchRecord], path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        for record in records {
            writer.serialize(DispatchRow::from(record))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export rolling backtest windows to CSV
    pub fn write_rolling(windows: &[RollingWindowResult], path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        for window in windows {
            let performance = &window.result.performance;
            writer.serialize(RollingRow {
                window_start: window.window_start,
                window_end: window.window_end,
                data_points: window.result.data_points,
                total_profit: performance.total_profit,
                total_revenue: performance.total_revenue,
                total_cost: performance.total_cost,
                operating_hours: performance.operating_hours,
                capacity_factor: performance.capacity_factor,
                profit_margin: performance.profit_margin,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl JsonFormatter {
    /// Pretty-print any report to a JSON file
    pub fn write<T: Serialize>(report: &T, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create JSON file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .with_context(|| format!("Failed to write JSON file: {}", path.display()))?;
        Ok(())
    }
}
