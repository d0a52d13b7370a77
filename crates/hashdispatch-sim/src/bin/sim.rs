// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! CLI entry point for the HashDispatch dispatch simulator

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use hashdispatch_core::{
    DateWindow, ModelConfig, NamedPolicy, apply_decisions, backtest, compare_policies,
    default_policies, risk_metrics, roi_metrics, rolling_backtest, summarize,
};
use hashdispatch_sim::{
    cli::{
        BacktestArgs, BatchArgs, BatchConfig, Cli, Commands, CompareArgs, CsvFormatter,
        DataArgs, ExampleConfigArgs, JsonFormatter, RunArgs, ScenarioConfig, TableFormatter,
    },
    pipeline::{
        load_model_config, parse_date, prepare, prepare_scenario, resolve_policies,
        resolve_policy,
    },
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Run(args) => run_command(&args),
        Commands::Compare(args) => compare_command(&args),
        Commands::Backtest(args) => backtest_command(&args),
        Commands::Batch(args) => batch_command(&args),
        Commands::ExampleConfig(args) => {
            example_config_command(&args);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to set tracing subscriber: {e}"))
}

fn run_command(args: &RunArgs) -> Result<()> {
    validate_data_args(&args.data)?;
    if let Some(investment) = args.investment
        && (investment <= 0.0 || !investment.is_finite())
    {
        bail!("Invalid investment: {investment}. Must be greater than 0.");
    }

    let config = load_model_config(args.data.config.as_deref())?;
    let (market, setup) = prepare(&args.data, &config)?;

    println!("Dispatching {}...", market.label);
    let mut records = setup.run(&market)?;

    if let Some(id) = &args.policy {
        let named = resolve_policy(id, &config)?;
        let decisions = named.policy.decide(&records)?;
        records = apply_decisions(&records, &decisions)?;
        println!("Applied policy: {} ({})", named.name, named.policy);
    }

    let summary = summarize(&records)?;
    println!("\n{}", TableFormatter::format_summary(&summary, &config));

    if args.risk {
        let decisions: Vec<bool> = records.iter().map(|r| r.should_operate).collect();
        let risk = risk_metrics(&records, &decisions)?;
        println!("\n{}", TableFormatter::format_risk(&risk));
    }

    if let Some(investment) = args.investment {
        match roi_metrics(&records, investment) {
            Some(roi) => println!("\n{}", TableFormatter::format_roi(&roi)),
            None => println!("\nROI metrics unavailable for an investment of {investment}"),
        }
    }

    if let Some(csv_path) = &args.csv_path {
        CsvFormatter::write_dispatch(&records, Path::new(csv_path))
            .with_context(|| format!("Failed to write CSV to {csv_path}"))?;
        println!("CSV exported to: {csv_path}");
    }

    if let Some(json_path) = &args.json_path {
        JsonFormatter::write(&summary, Path::new(json_path))
            .with_context(|| format!("Failed to write JSON to {json_path}"))?;
        println!("JSON exported to: {json_path}");
    }

    Ok(())
}

fn compare_command(args: &CompareArgs) -> Result<()> {
    validate_data_args(&args.data)?;

    let config = load_model_config(args.data.config.as_deref())?;
    let policies = resolve_policies(&args.policies, &config)?;
    let (market, setup) = prepare(&args.data, &config)?;

    println!(
        "Comparing {} policies on {}...",
        policies.len(),
        market.label
    );
    let records = setup.run(&market)?;
    let comparison = compare_policies(&records, &policies)?;

    println!("\n{}", TableFormatter::format_comparison(&comparison));

    if let Some(json_path) = &args.json_path {
        JsonFormatter::write(&comparison, Path::new(json_path))
            .with_context(|| format!("Failed to write JSON to {json_path}"))?;
        println!("JSON exported to: {json_path}");
    }

    Ok(())
}

fn backtest_command(args: &BacktestArgs) -> Result<()> {
    validate_data_args(&args.data)?;
    if args.rolling && (args.from.is_some() || args.to.is_some()) {
        bail!("--from/--to cannot be combined with --rolling; use --start/--end to limit the data");
    }

    let config = load_model_config(args.data.config.as_deref())?;
    let named = resolve_policy(&args.policy, &config)?;
    let (market, setup) = prepare(&args.data, &config)?;
    let records = setup.run(&market)?;

    if args.rolling {
        let window_days = args
            .window_days
            .unwrap_or(config.dispatch.rolling_window_days);
        let step_days = args.step_days.unwrap_or(config.dispatch.rolling_step_days);

        let windows = rolling_backtest(&records, &named.policy, window_days, step_days)?;
        if windows.is_empty() {
            warn!(
                "No complete {}-day window fits in {} days of data",
                window_days,
                market.window.days()
            );
        }
        println!("\n{}", TableFormatter::format_rolling(&named.name, &windows));

        if let Some(csv_path) = &args.csv_path {
            CsvFormatter::write_rolling(&windows, Path::new(csv_path))
                .with_context(|| format!("Failed to write CSV to {csv_path}"))?;
            println!("CSV exported to: {csv_path}");
        }
        return Ok(());
    }

    let window = match (&args.from, &args.to) {
        (None, None) => None,
        (from, to) => {
            let from = from.as_deref().map(parse_date).transpose()?;
            let to = to.as_deref().map(parse_date).transpose()?;
            let start = from.unwrap_or_else(|| market.window.start.date_naive());
            let end = to.unwrap_or_else(|| market.window.end.date_naive());
            Some(DateWindow::from_dates(start, end)?)
        }
    };

    let result = backtest(&records, &named.policy, window.as_ref())?;
    println!("\n{}", TableFormatter::format_backtest(&named.name, &result));

    if args.csv_path.is_some() {
        warn!("--csv-path is only used with --rolling");
    }

    Ok(())
}

fn batch_command(args: &BatchArgs) -> Result<()> {
    validate_batch_args(args)?;

    let config = BatchConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load batch config from {}", args.config))?;

    let output_dir = PathBuf::from(args.output_dir.as_ref().unwrap_or(&config.output.dir));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let policies = if config.policies.is_empty() {
        default_policies(&config.model)
    } else {
        config.policies.clone()
    };

    println!(
        "Running batch with {} scenarios and {} policies...",
        config.scenarios.len(),
        policies.len()
    );
    println!("Output directory: {}\n", output_dir.display());

    let mut failed = 0_usize;
    for (idx, scenario) in config.scenarios.iter().enumerate() {
        println!(
            "[{}/{}] Running scenario: {}",
            idx + 1,
            config.scenarios.len(),
            scenario.name
        );

        match run_batch_scenario(scenario, &config, &policies, &output_dir) {
            Ok(best) => println!("  ✓ Completed (best policy: {best})\n"),
            Err(e) => {
                failed += 1;
                eprintln!("  ✗ Failed: {e:#}\n");
            }
        }
    }

    println!("Batch complete!");
    if failed > 0 {
        println!("{failed} scenario(s) failed");
    }
    println!("Results saved to: {}", output_dir.display());

    Ok(())
}

/// Dispatch one scenario, compare the policies and write its outputs; returns the best policy name
fn run_batch_scenario(
    scenario: &ScenarioConfig,
    config: &BatchConfig,
    policies: &[NamedPolicy],
    output_dir: &Path,
) -> Result<String> {
    let (market, setup) = prepare_scenario(scenario, &config.model)?;
    let records = setup.run(&market)?;
    let summary = summarize(&records)?;
    let comparison = compare_policies(&records, policies)?;

    let best = comparison
        .best_result()
        .ok_or_else(|| anyhow!("Policy comparison returned no results"))?;
    let best_name = best.name.clone();
    info!(
        "Scenario {}: best policy {} with ${:.2} profit",
        scenario.name, best.name, best.performance.total_profit
    );

    if config.output.dispatch_csv {
        let decisions = best.policy.decide(&records)?;
        let gated = apply_decisions(&records, &decisions)?;
        let path = output_dir.join(format!("{}.csv", scenario.name));
        CsvFormatter::write_dispatch(&gated, &path)
            .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    }

    if config.output.summary_json {
        let path = output_dir.join(format!("{}.json", scenario.name));
        let report = json!({
            "scenario": scenario.name,
            "source": market.label,
            "summary": summary,
            "comparison": comparison,
        });
        JsonFormatter::write(&report, &path)
            .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    }

    Ok(best_name)
}

fn example_config_command(args: &ExampleConfigArgs) {
    if args.kind == "batch" {
        print!("{}", BatchConfig::example_toml());
    } else {
        print!("{}", ModelConfig::example_toml());
    }
}

/// Validate the shared data options before loading anything
fn validate_data_args(data: &DataArgs) -> Result<()> {
    if data.electricity.is_empty() && data.hashprice.is_some() {
        bail!("--hashprice requires at least one --electricity ZONE=PATH");
    }

    if let Some(hashprice) = &data.hashprice
        && !Path::new(hashprice).exists()
    {
        bail!(
            "Hashprice file not found: {}\n\nPlease check the path and try again.",
            hashprice
        );
    }

    if let Some(config_path) = &data.config
        && !Path::new(config_path).exists()
    {
        bail!(
            "Model config file not found: {}\n\nPlease check the path and try again.",
            config_path
        );
    }

    if let Some(efficiency) = data.efficiency
        && efficiency <= 0.0
    {
        bail!("Invalid efficiency: {efficiency} W/TH. Must be greater than 0.");
    }

    Ok(())
}

fn validate_batch_args(args: &BatchArgs) -> Result<()> {
    if !Path::new(&args.config).exists() {
        bail!(
            "Configuration file not found: {}\n\n\
            Print a template with: hashdispatch-sim example-config --kind batch",
            args.config
        );
    }
    Ok(())
}
