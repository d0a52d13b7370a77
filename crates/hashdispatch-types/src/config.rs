// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Immutable model configuration, read once at startup and passed by reference.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_base_url() -> String {
    "https://api.hashrateindex.com/v1/hashrateindex".to_owned()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_facility_size_mw() -> f64 {
    50.0
}

fn default_efficiency_w_per_th() -> f64 {
    30.0
}

fn default_hashprice_unit() -> String {
    "$/TH/day".to_owned()
}

fn default_electricity_price_unit() -> String {
    "$/MWh".to_owned()
}

fn default_peak_hours() -> Vec<u32> {
    vec![14, 15, 16, 17, 18, 19]
}

fn default_rolling_window_days() -> u32 {
    30
}

fn default_rolling_step_days() -> u32 {
    7
}

fn default_rolling_average_window_hours() -> usize {
    24
}

fn default_rolling_average_multiplier() -> f64 {
    1.1
}

/// Root configuration bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub mining: MiningDefaults,

    #[serde(default)]
    pub dispatch: DispatchDefaults,
}

/// Hashprice feed endpoint, consumed by ingestion only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Facility defaults and display units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningDefaults {
    /// Facility size used for zones without an explicit size (MW)
    #[serde(default = "default_facility_size_mw")]
    pub default_facility_size_mw: f64,

    /// Miner efficiency (W/TH)
    #[serde(default = "default_efficiency_w_per_th")]
    pub default_efficiency_w_per_th: f64,

    /// Minimum hourly profit required to operate ($)
    #[serde(default)]
    pub default_min_profit_threshold: f64,

    #[serde(default = "default_hashprice_unit")]
    pub hashprice_unit: String,

    #[serde(default = "default_electricity_price_unit")]
    pub electricity_price_unit: String,
}

impl Default for MiningDefaults {
    fn default() -> Self {
        Self {
            default_facility_size_mw: default_facility_size_mw(),
            default_efficiency_w_per_th: default_efficiency_w_per_th(),
            default_min_profit_threshold: 0.0,
            hashprice_unit: default_hashprice_unit(),
            electricity_price_unit: default_electricity_price_unit(),
        }
    }
}

/// Policy and backtest defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchDefaults {
    /// Hours of day (UTC) treated as peak by the peak-avoidance policy
    #[serde(default = "default_peak_hours")]
    pub peak_hours: Vec<u32>,

    #[serde(default = "default_rolling_window_days")]
    pub rolling_window_days: u32,

    #[serde(default = "default_rolling_step_days")]
    pub rolling_step_days: u32,

    #[serde(default = "default_rolling_average_window_hours")]
    pub rolling_average_window_hours: usize,

    #[serde(default = "default_rolling_average_multiplier")]
    pub rolling_average_multiplier: f64,
}

impl Default for DispatchDefaults {
    fn default() -> Self {
        Self {
            peak_hours: default_peak_hours(),
            rolling_window_days: default_rolling_window_days(),
            rolling_step_days: default_rolling_step_days(),
            rolling_average_window_hours: default_rolling_average_window_hours(),
            rolling_average_multiplier: default_rolling_average_multiplier(),
        }
    }
}

impl ModelConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse model configuration TOML")
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Commented example configuration
    pub fn example_toml() -> String {
        r#"# HashDispatch - model configuration

[api]
base_url = "https://api.hashrateindex.com/v1/hashrateindex"
timeout_secs = 30

[mining]
default_facility_size_mw = 50.0      # MW per zone when not given explicitly
default_efficiency_w_per_th = 30.0   # W/TH, shared by every zone
default_min_profit_threshold = 0.0   # $ per hour
hashprice_unit = "$/TH/day"
electricity_price_unit = "$/MWh"

[dispatch]
peak_hours = [14, 15, 16, 17, 18, 19]
rolling_window_days = 30
rolling_step_days = 7
rolling_average_window_hours = 24
rolling_average_multiplier = 1.1
"#
        .to_owned()
    }
}
