// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! TOML configuration file parsing for batch runs.

use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use hashdispatch_core::{ModelConfig, NamedPolicy};
use serde::{Deserialize, Serialize};

use crate::pipeline::ContractOptions;

/// Root configuration structure for batch runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Model defaults shared by every scenario
    #[serde(default)]
    pub model: ModelConfig,

    /// Policies compared in every scenario; the default set when empty
    #[serde(default)]
    pub policies: Vec<NamedPolicy>,

    /// List of scenarios to run
    pub scenarios: Vec<ScenarioConfig>,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Individual scenario configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Human-readable name, also used for output file names
    pub name: String,

    /// Start date (YYYY-MM-DD)
    pub start: String,

    /// End date (YYYY-MM-DD, inclusive)
    pub end: String,

    /// Facility size per zone (MW); zones not listed use the model default
    #[serde(default)]
    pub facility_mw: BTreeMap<String, f64>,

    /// Miner efficiency override (W/TH)
    pub efficiency_w_per_th: Option<f64>,

    /// Minimum profit threshold override ($/h)
    pub min_profit_threshold: Option<f64>,

    #[serde(default)]
    pub contract: ContractOptions,

    /// Data source
    #[serde(flatten)]
    pub source: ScenarioSource,
}

/// Source of scenario data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScenarioSource {
    /// Generated market
    #[serde(rename = "synthetic")]
    Synthetic {
        /// Market scenario id (flat, diurnal, volatile, squeeze)
        market: String,

        #[serde(default = "default_zones")]
        zones: Vec<String>,

        #[serde(default = "default_seed")]
        seed: u64,
    },

    /// Electricity CSV files per zone plus a hashprice CSV
    #[serde(rename = "csv")]
    Csv {
        /// Zone -> electricity CSV path
        electricity: BTreeMap<String, String>,

        /// Hashprice CSV path
        hashprice: String,

        /// IANA zone for electricity timestamps without an offset; hashprice is UTC
        #[serde(default = "default_source_tz")]
        source_tz: String,
    },
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for CSV and JSON output files
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Write each scenario's dispatch under its best policy as CSV
    #[serde(default = "default_true")]
    pub dispatch_csv: bool,

    /// Write each scenario's summary and comparison as JSON
    #[serde(default = "default_true")]
    pub summary_json: bool,
}

fn default_zones() -> Vec<String> {
    vec!["houston".to_owned()]
}

fn default_seed() -> u64 {
    42
}

fn default_source_tz() -> String {
    "UTC".to_owned()
}

fn default_output_dir() -> String {
    "./batch_results".to_owned()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            dispatch_csv: true,
            summary_json: true,
        }
    }
}

impl BatchConfig {
    /// Load batch configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;

        Self::from_toml_str(&content).with_context(|| format!("Failed to parse TOML config: {path}"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Generate example batch config as TOML string
    pub fn example_toml() -> String {
        r#"# HashDispatch - Batch Configuration Example

[model.mining]
default_facility_size_mw = 50.0
default_efficiency_w_per_th = 30.0
default_min_profit_threshold = 0.0

[model.dispatch]
peak_hours = [14, 15, 16, 17, 18, 19]

# Policies to compare (omit for the default set)
[[policies]]
name = "Simple Threshold"
kind = "threshold"
threshold = 0.0

[[policies]]
name = "Percentile 70%"
kind = "percentile"
percentile = 70.0

[[policies]]
name = "Avoid Peak Hours"
kind = "peak_avoidance"
peak_hours = [14, 15, 16, 17, 18, 19]

# Scenario 1: synthetic diurnal market, two zones
[[scenarios]]
name = "diurnal_q1"
type = "synthetic"
market = "diurnal"
zones = ["houston", "west"]
seed = 7
start = "2024-01-01"
end = "2024-03-31"

[scenarios.facility_mw]
houston = 30.0
west = 20.0

# Scenario 2: historical CSV data with a 5x16 contract
[[scenarios]]
name = "ercot_2024"
type = "csv"
hashprice = "data/hashprice.csv"
source_tz = "America/Chicago"
start = "2024-01-01"
end = "2024-06-30"

[scenarios.electricity]
houston = "data/lz_houston.csv"

[scenarios.contract]
zone = "houston"
block = "5x16"
size_mwh = 20.0
rate_per_mwh = 45.0

[output]
dir = "./batch_results"
dispatch_csv = true
summary_json = true
"#
        .to_owned()
    }
}
