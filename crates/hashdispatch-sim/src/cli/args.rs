// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hashdispatch-sim")]
#[command(author, version, about = "HashDispatch mining dispatch simulator")]
#[command(
    long_about = "Estimate Bitcoin mining profitability under hourly power prices and hashprice.\n\
    \nRuns the base dispatch, compares dispatch policies and backtests them on\n\
    synthetic markets or historical CSV data.\n\
    \nExamples:\n  \
    hashdispatch-sim run                                  # Diurnal synthetic market\n  \
    hashdispatch-sim compare --scenario volatile          # Compare the default policies\n  \
    hashdispatch-sim backtest --policy p70 --rolling      # Walk-forward backtest\n  \
    hashdispatch-sim batch --config scenarios.toml        # Run multiple scenarios"
)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the base dispatch and print a summary
    #[command(
        long_about = "Join the market series, dispatch every hour with the profit threshold\n\
        and print summary statistics.\n\
        \nData Sources (choose one):\n  \
        - Synthetic: --scenario <name> (flat, diurnal, volatile, squeeze)\n  \
        - CSV: --electricity ZONE=PATH (repeatable) --hashprice PATH\n\
        \nExamples:\n  \
        hashdispatch-sim run --scenario flat --facility houston=10\n  \
        hashdispatch-sim run --electricity houston=lz_houston.csv --hashprice hp.csv \\\n    \
          --start 2024-01-01 --end 2024-03-31 --source-tz America/Chicago --risk\n  \
        hashdispatch-sim run --investment 25000000 --csv-path dispatch.csv"
    )]
    Run(RunArgs),

    /// Compare dispatch policies on the same data
    #[command(
        long_about = "Evaluate several dispatch policies over the same dispatched hours and\n\
        rank them by total profit. The first policy wins ties.\n\
        \nPolicy shortcuts: threshold, p60, p70, pNN, rolling, peak, all\n\
        \nExamples:\n  \
        hashdispatch-sim compare\n  \
        hashdispatch-sim compare --policies threshold,p80,peak --scenario volatile"
    )]
    Compare(CompareArgs),

    /// Backtest a policy over a sub-window or in rolling windows
    #[command(
        long_about = "Backtest one policy. By default the whole loaded window is used;\n\
        --from/--to restrict it. With --rolling, fixed windows slide over the data\n\
        and each window is evaluated on its own.\n\
        \nExamples:\n  \
        hashdispatch-sim backtest --policy p70 --from 2024-02-01 --to 2024-02-29\n  \
        hashdispatch-sim backtest --policy rolling --rolling --window-days 30 --step-days 7"
    )]
    Backtest(BacktestArgs),

    /// Run batch scenarios from TOML configuration file
    #[command(
        long_about = "Execute multiple scenarios defined in a TOML config file.\n\
        Each scenario is dispatched and all configured policies are compared.\n\
        \nExamples:\n  \
        hashdispatch-sim batch --config scenarios.toml\n  \
        hashdispatch-sim batch --config test.toml --output-dir ./results"
    )]
    Batch(BatchArgs),

    /// Print an example configuration file
    ExampleConfig(ExampleConfigArgs),
}

/// Data source, facility and contract options shared by run, compare and backtest
#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Synthetic market scenario
    #[arg(
        long,
        default_value = "diurnal",
        help = "Synthetic market scenario to simulate",
        long_help = "Available scenarios:\n  \
          - flat: constant $40/MWh and 0.06 $/TH/day\n  \
          - diurnal: cheap nights, expensive afternoon peak\n  \
          - volatile: price spikes and negative prices\n  \
          - squeeze: hashprice declining over the window\n\
          \nIgnored when --electricity is given"
    )]
    pub scenario: String,

    /// Zones for synthetic data (comma-separated)
    #[arg(long, default_value = "houston")]
    pub zones: String,

    /// Seed for synthetic data
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Electricity price CSV per zone
    #[arg(
        long,
        value_name = "ZONE=PATH",
        help = "Electricity price CSV for a load zone (repeatable)",
        long_help = "Electricity price CSV for one load zone. Repeat for multiple zones.\n\
          Time and price columns are detected by name.\n\
          \nExample: --electricity houston=lz_houston.csv --electricity west=lz_west.csv"
    )]
    pub electricity: Vec<String>,

    /// Hashprice CSV (required with --electricity)
    #[arg(long, value_name = "PATH")]
    pub hashprice: Option<String>,

    /// IANA time zone for electricity timestamps without an offset (hashprice is UTC)
    #[arg(long, default_value = "UTC", value_name = "TZ")]
    pub source_tz: String,

    /// First day of the analysis window
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<String>,

    /// Last day of the analysis window (inclusive)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<String>,

    /// Days of synthetic data when --end is not given
    #[arg(long, default_value_t = 90)]
    pub days: u32,

    /// Facility size for a zone
    #[arg(
        long,
        value_name = "ZONE=MW",
        help = "Facility size for a load zone in MW (repeatable, default from config)"
    )]
    pub facility: Vec<String>,

    /// Miner efficiency in W/TH
    #[arg(long, help = "Miner efficiency in W/TH (must be > 0, default from config)")]
    pub efficiency: Option<f64>,

    /// Minimum hourly profit required to operate
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// Zone the fixed-price contract is bound to
    #[arg(long, value_name = "ZONE")]
    pub contract_zone: Option<String>,

    /// Contract block
    #[arg(long, value_name = "BLOCK", help = "Contract block: 7x24, 5x16, 2x16 or 7x8")]
    pub contract_block: Option<String>,

    /// Contracted volume per covered hour (clamped to the zone's facility size)
    #[arg(long, value_name = "MWH")]
    pub contract_size: Option<f64>,

    /// Contract rate in $/MWh
    #[arg(long, value_name = "USD")]
    pub contract_rate: Option<f64>,

    /// Model configuration TOML
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Re-gate the dispatch with a policy before reporting
    #[arg(long, help = "Policy shortcut (threshold, p60, p70, pNN, rolling, peak)")]
    pub policy: Option<String>,

    /// Show daily risk metrics
    #[arg(long, default_value_t = false)]
    pub risk: bool,

    /// Initial investment for ROI metrics (USD)
    #[arg(long, value_name = "USD")]
    pub investment: Option<f64>,

    /// Hour-by-hour dispatch CSV
    #[arg(long, value_name = "PATH")]
    pub csv_path: Option<String>,

    /// Summary JSON
    #[arg(long, value_name = "PATH")]
    pub json_path: Option<String>,
}

#[derive(Debug, Parser)]
pub struct CompareArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Comma-separated policy shortcuts or "all"
    #[arg(long, default_value = "all")]
    pub policies: String,

    /// Comparison JSON
    #[arg(long, value_name = "PATH")]
    pub json_path: Option<String>,
}

#[derive(Debug, Parser)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Policy shortcut
    #[arg(long, default_value = "threshold")]
    pub policy: String,

    /// First day of the backtest sub-window
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub from: Option<String>,

    /// Last day of the backtest sub-window (inclusive)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub to: Option<String>,

    /// Walk-forward backtest in fixed windows
    #[arg(long, default_value_t = false)]
    pub rolling: bool,

    /// Rolling window size in days (default from config)
    #[arg(long)]
    pub window_days: Option<u32>,

    /// Rolling step in days (default from config)
    #[arg(long)]
    pub step_days: Option<u32>,

    /// Rolling results CSV
    #[arg(long, value_name = "PATH")]
    pub csv_path: Option<String>,
}

#[derive(Debug, Parser)]
pub struct BatchArgs {
    /// Path to TOML configuration file
    #[arg(
        long,
        value_name = "PATH",
        help = "Path to batch configuration file",
        long_help = "TOML file defining multiple scenarios to run.\n\
          Print a template with: hashdispatch-sim example-config --kind batch\n\
          \nExample: --config batch_scenarios.toml"
    )]
    pub config: String,

    /// Output directory (overrides config setting)
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ExampleConfigArgs {
    /// Which template to print
    #[arg(long, default_value = "model", value_parser = ["model", "batch"])]
    pub kind: String,
}
