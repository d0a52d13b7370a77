// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Glue between loaded market data and the dispatch engine.
//!
//! Facility sizes, the optional contract and the policy are resolved here from
//! command-line or batch settings, then the market series are joined and dispatched.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use hashdispatch_core::{
    ContractBlock, ContractTerms, DateWindow, DispatchPolicy, DispatchRecord, FacilitySpec,
    ModelConfig, NamedPolicy, default_policies, join_series, run_dispatch, validate_contract,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cli::args::DataArgs;
use crate::cli::config::{ScenarioConfig, ScenarioSource};
use crate::cli::data_loaders::{CsvLoader, DataLoader, MarketData, SyntheticLoader};
use crate::scenarios::{MarketScenario, preset_listing};

/// First day of synthetic data when no --start is given
const DEFAULT_SYNTHETIC_START: (i32, u32, u32) = (2024, 1, 1);

/// Model configuration from a TOML file, or the defaults
pub fn load_model_config(path: Option<&str>) -> Result<ModelConfig> {
    match path {
        Some(path) => ModelConfig::from_file(path),
        None => Ok(ModelConfig::default()),
    }
}

/// Parse a YYYY-MM-DD date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").with_context(|| {
        format!(
            "Invalid date format: '{raw}'\n\n\
            Expected format: YYYY-MM-DD (e.g., 2024-01-15)\n\
            Please check the date and try again."
        )
    })
}

/// Parse an IANA time zone name
pub fn parse_time_zone(raw: &str) -> Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("Unknown time zone '{raw}': {e}"))
}

/// Analysis window from optional start/end dates.
///
/// Synthetic data always needs a window: a missing start falls back to a fixed
/// date and a missing end to `start + days - 1`. CSV data without dates uses the
/// full range of the files.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
    synthetic: bool,
) -> Result<Option<DateWindow>> {
    let start = start.map(parse_date).transpose()?;
    let end = end.map(parse_date).transpose()?;

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (None, None) if !synthetic => return Ok(None),
        (start, end) => {
            if days == 0 {
                bail!("--days must be greater than 0");
            }
            let (y, m, d) = DEFAULT_SYNTHETIC_START;
            let start = match start {
                Some(start) => start,
                None => {
                    let fallback = NaiveDate::from_ymd_opt(y, m, d)
                        .ok_or_else(|| anyhow!("Invalid default start date"))?;
                    match end {
                        Some(end) => end
                            .checked_sub_days(Days::new(u64::from(days) - 1))
                            .unwrap_or(fallback),
                        None => fallback,
                    }
                }
            };
            let end = match end {
                Some(end) => end,
                None => start
                    .checked_add_days(Days::new(u64::from(days) - 1))
                    .ok_or_else(|| anyhow!("End date out of range"))?,
            };
            (start, end)
        }
    };

    Ok(Some(DateWindow::from_dates(start, end)?))
}

/// Load market data and resolve facility, threshold and contract from the shared options
pub fn prepare(data: &DataArgs, config: &ModelConfig) -> Result<(MarketData, DispatchSetup)> {
    let synthetic = data.electricity.is_empty();
    let window = resolve_window(data.start.as_deref(), data.end.as_deref(), data.days, synthetic)?;

    let loader: Box<dyn DataLoader> = if synthetic {
        let scenario = MarketScenario::from_id(&data.scenario).ok_or_else(|| {
            anyhow!(
                "Unknown scenario '{}'. Available scenarios:\n{}",
                data.scenario,
                preset_listing()
            )
        })?;
        let zones: Vec<String> = data
            .zones
            .split(',')
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .map(str::to_owned)
            .collect();
        Box::new(SyntheticLoader {
            scenario,
            zones,
            seed: data.seed,
        })
    } else {
        let Some(hashprice) = &data.hashprice else {
            bail!("--hashprice is required when using --electricity");
        };
        let electricity = data
            .electricity
            .iter()
            .map(|entry| parse_assignment(entry).map(|(zone, path)| (zone, PathBuf::from(path))))
            .collect::<Result<Vec<_>>>()?;
        Box::new(CsvLoader::new(
            electricity,
            PathBuf::from(hashprice),
            parse_time_zone(&data.source_tz)?,
        ))
    };

    let market = loader.load(window.as_ref())?;

    let efficiency = data
        .efficiency
        .unwrap_or(config.mining.default_efficiency_w_per_th);
    if efficiency <= 0.0 {
        bail!("Invalid efficiency: {efficiency} W/TH. Must be greater than 0.");
    }

    let facility = build_facility(
        &zones_of(&market),
        &parse_facility_sizes(&data.facility)?,
        config.mining.default_facility_size_mw,
        efficiency,
    )?;

    let contract = ContractOptions {
        zone: data.contract_zone.clone(),
        block: data.contract_block.clone(),
        size_mwh: data.contract_size,
        rate_per_mwh: data.contract_rate,
    }
    .resolve(&facility)?;

    let setup = DispatchSetup {
        facility,
        min_profit_threshold: data
            .threshold
            .unwrap_or(config.mining.default_min_profit_threshold),
        contract,
    };

    Ok((market, setup))
}

/// Load market data and resolve the dispatch setup for one batch scenario
pub fn prepare_scenario(
    scenario: &ScenarioConfig,
    config: &ModelConfig,
) -> Result<(MarketData, DispatchSetup)> {
    let window = DateWindow::from_dates(parse_date(&scenario.start)?, parse_date(&scenario.end)?)?;

    let loader: Box<dyn DataLoader> = match &scenario.source {
        ScenarioSource::Synthetic {
            market,
            zones,
            seed,
        } => {
            let market_scenario = MarketScenario::from_id(market)
                .ok_or_else(|| {
                    anyhow!(
                        "Unknown market scenario '{market}'. Available scenarios:\n{}",
                        preset_listing()
                    )
                })?;
            Box::new(SyntheticLoader {
                scenario: market_scenario,
                zones: zones.clone(),
                seed: *seed,
            })
        }
        ScenarioSource::Csv {
            electricity,
            hashprice,
            source_tz,
        } => Box::new(CsvLoader::new(
            electricity
                .iter()
                .map(|(zone, path)| (zone.clone(), PathBuf::from(path)))
                .collect(),
            PathBuf::from(hashprice),
            parse_time_zone(source_tz)?,
        )),
    };

    let market = loader.load(Some(&window))?;

    let efficiency = scenario
        .efficiency_w_per_th
        .unwrap_or(config.mining.default_efficiency_w_per_th);
    if efficiency <= 0.0 {
        bail!("Invalid efficiency: {efficiency} W/TH. Must be greater than 0.");
    }

    let sizes: Vec<(String, f64)> = scenario
        .facility_mw
        .iter()
        .map(|(zone, size)| (zone.clone(), *size))
        .collect();
    let facility = build_facility(
        &zones_of(&market),
        &sizes,
        config.mining.default_facility_size_mw,
        efficiency,
    )?;
    let contract = scenario.contract.resolve(&facility)?;

    let setup = DispatchSetup {
        facility,
        min_profit_threshold: scenario
            .min_profit_threshold
            .unwrap_or(config.mining.default_min_profit_threshold),
        contract,
    };

    Ok((market, setup))
}

/// Split a `KEY=VALUE` argument
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected ZONE=VALUE, got '{raw}'"))?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        bail!("Expected ZONE=VALUE, got '{raw}'");
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Parse repeated `ZONE=MW` arguments
pub fn parse_facility_sizes(raw: &[String]) -> Result<Vec<(String, f64)>> {
    raw.iter()
        .map(|entry| {
            let (zone, value) = parse_assignment(entry)?;
            let size: f64 = value
                .parse()
                .with_context(|| format!("Invalid facility size for zone {zone}: '{value}'"))?;
            Ok((zone, size))
        })
        .collect()
}

/// Load zones in first-appearance order
pub fn zones_of(market: &MarketData) -> Vec<String> {
    let mut zones: Vec<String> = Vec::new();
    for point in &market.electricity {
        if !zones.iter().any(|z| z == &point.load_zone) {
            zones.push(point.load_zone.clone());
        }
    }
    zones
}

/// Facility covering every zone; zones without an explicit size get `default_size_mw`
pub fn build_facility(
    zones: &[String],
    sizes: &[(String, f64)],
    default_size_mw: f64,
    efficiency_w_per_th: f64,
) -> Result<FacilitySpec> {
    for (zone, _) in sizes {
        if !zones.contains(zone) {
            warn!("Facility size given for zone {} which has no price data", zone);
        }
    }

    let mut facility = FacilitySpec::new(efficiency_w_per_th);
    for zone in zones {
        let size = sizes
            .iter()
            .find(|(z, _)| z == zone)
            .map_or(default_size_mw, |(_, size)| *size);
        if size <= 0.0 {
            bail!("Invalid facility size for zone {zone}: {size} MW. Must be greater than 0.");
        }
        facility = facility.with_zone(zone.clone(), size);
    }
    Ok(facility)
}

/// Contract settings as given on the command line or in a batch file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractOptions {
    pub zone: Option<String>,
    pub block: Option<String>,
    pub size_mwh: Option<f64>,
    pub rate_per_mwh: Option<f64>,
}

impl ContractOptions {
    fn is_empty(&self) -> bool {
        self.zone.is_none()
            && self.block.is_none()
            && self.size_mwh.is_none()
            && self.rate_per_mwh.is_none()
    }

    /// Build validated terms, clamping the size to the zone's facility power
    pub fn resolve(&self, facility: &FacilitySpec) -> Result<Option<ContractTerms>> {
        if self.is_empty() {
            return Ok(None);
        }

        let (Some(zone), Some(size_mwh), Some(rate_per_mwh)) =
            (&self.zone, self.size_mwh, self.rate_per_mwh)
        else {
            bail!("A contract needs a zone, a size and a rate (block defaults to 7x24)");
        };

        let block = match &self.block {
            Some(raw) => raw.parse::<ContractBlock>()?,
            None => ContractBlock::SevenBy24,
        };

        let facility_size = facility
            .size_for(zone)
            .ok_or_else(|| anyhow!("Contract zone {zone} is not part of the facility"))?;

        let terms = ContractTerms {
            zone: zone.clone(),
            block,
            size_mwh,
            rate_per_mwh,
        };
        validate_contract(&terms)?;

        let (terms, clamped) = terms.clamped_to(facility_size);
        if clamped {
            warn!(
                "Contract size {} MWh exceeds facility size in {}; clamped to {} MWh",
                size_mwh, zone, facility_size
            );
        }
        Ok(Some(terms))
    }
}

/// Everything needed to dispatch a market besides the market itself
#[derive(Debug, Clone)]
pub struct DispatchSetup {
    pub facility: FacilitySpec,
    pub min_profit_threshold: f64,
    pub contract: Option<ContractTerms>,
}

impl DispatchSetup {
    /// Join the market series over their window and run the base dispatch
    pub fn run(&self, market: &MarketData) -> Result<Vec<DispatchRecord>> {
        info!(
            "Facility: {} zones, {:.1} MW total at {:.1} W/TH",
            self.facility.zones.len(),
            self.facility.total_power_mw(),
            self.facility.efficiency_w_per_th
        );
        let joined = join_series(&market.electricity, &market.hashprice, &market.window)
            .with_context(|| format!("Failed to join market data for {}", market.label))?;
        let records = run_dispatch(
            &joined,
            &self.facility,
            self.min_profit_threshold,
            self.contract.as_ref(),
        )?;
        info!("Dispatched {} hours of {}", records.len(), market.label);
        Ok(records)
    }
}

/// Resolve a policy shortcut against the configured defaults.
///
/// Shortcuts: threshold, p60, p70, rolling, peak, or `pNN` for any percentile.
pub fn resolve_policy(id: &str, config: &ModelConfig) -> Result<NamedPolicy> {
    let id = id.trim().to_lowercase();
    let defaults = default_policies(config);
    let pick = |index: usize| {
        defaults
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("Default policy set is incomplete"))
    };

    match id.as_str() {
        "threshold" | "simple" => pick(0),
        "p60" => pick(1),
        "p70" => pick(2),
        "rolling" | "rolling_average" => pick(3),
        "peak" | "avoid_peak" => pick(4),
        other => {
            if let Some(pct) = other.strip_prefix('p').and_then(|v| v.parse::<f64>().ok()) {
                if !(0.0..=100.0).contains(&pct) {
                    bail!("Percentile must be between 0 and 100, got {pct}");
                }
                return Ok(NamedPolicy::new(
                    format!("Percentile {pct}%"),
                    DispatchPolicy::Percentile { percentile: pct },
                ));
            }
            bail!(
                "Unknown policy '{other}'. Use one of: threshold, p60, p70, pNN, rolling, peak"
            )
        }
    }
}

/// Resolve a comma-separated list of policy shortcuts, or `all` for the default set
pub fn resolve_policies(list: &str, config: &ModelConfig) -> Result<Vec<NamedPolicy>> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(default_policies(config));
    }
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|id| resolve_policy(id, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::data_loaders::{DataLoader, SyntheticLoader};
    use crate::scenarios::MarketScenario;
    use chrono::NaiveDate;
    use hashdispatch_core::DateWindow;

    fn flat_market(zones: &[&str]) -> MarketData {
        let window = DateWindow::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        )
        .unwrap();
        SyntheticLoader {
            scenario: MarketScenario::Flat,
            zones: zones.iter().map(|z| (*z).to_owned()).collect(),
            seed: 1,
        }
        .load(Some(&window))
        .unwrap()
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("houston = data/hou.csv").unwrap(),
            ("houston".to_owned(), "data/hou.csv".to_owned())
        );
        assert!(parse_assignment("houston").is_err());
        assert!(parse_assignment("=5").is_err());
        assert!(parse_facility_sizes(&["west=abc".to_owned()]).is_err());
    }

    #[test]
    fn test_build_facility_defaults_missing_zones() {
        let zones = vec!["houston".to_owned(), "west".to_owned()];
        let facility = build_facility(&zones, &[("west".to_owned(), 20.0)], 50.0, 30.0).unwrap();

        assert_eq!(facility.size_for("houston"), Some(50.0));
        assert_eq!(facility.size_for("west"), Some(20.0));
        assert!(build_facility(&zones, &[("west".to_owned(), 0.0)], 50.0, 30.0).is_err());
    }

    #[test]
    fn test_contract_is_clamped() {
        let facility = FacilitySpec::new(30.0).with_zone("houston", 10.0);
        let options = ContractOptions {
            zone: Some("houston".to_owned()),
            block: Some("5x16".to_owned()),
            size_mwh: Some(25.0),
            rate_per_mwh: Some(35.0),
        };

        let terms = options.resolve(&facility).unwrap().unwrap();
        assert_eq!(terms.size_mwh, 10.0);
        assert_eq!(terms.block, ContractBlock::FiveBy16);

        assert_eq!(ContractOptions::default().resolve(&facility).unwrap(), None);

        let incomplete = ContractOptions {
            zone: Some("houston".to_owned()),
            ..ContractOptions::default()
        };
        assert!(incomplete.resolve(&facility).is_err());
    }

    #[test]
    fn test_resolve_policy_shortcuts() {
        let config = ModelConfig::default();
        assert_eq!(resolve_policy("P70", &config).unwrap().name, "Percentile 70%");
        assert_eq!(
            resolve_policy("p85", &config).unwrap().policy,
            DispatchPolicy::Percentile { percentile: 85.0 }
        );
        assert!(resolve_policy("p150", &config).is_err());
        assert!(resolve_policy("magic", &config).is_err());

        assert_eq!(resolve_policies("all", &config).unwrap().len(), 5);
        assert_eq!(resolve_policies("threshold, peak", &config).unwrap().len(), 2);
    }

    #[test]
    fn test_resolve_window() {
        // Synthetic with nothing given: fixed start, `days` whole days
        let window = resolve_window(None, None, 10, true).unwrap().unwrap();
        assert_eq!(window.start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(window.end.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());

        let window = resolve_window(Some("2024-02-01"), Some("2024-02-29"), 10, true)
            .unwrap()
            .unwrap();
        assert_eq!(window.days(), 28);

        // CSV without dates uses whatever the files contain
        assert!(resolve_window(None, None, 10, false).unwrap().is_none());

        assert!(resolve_window(Some("2024-13-01"), None, 10, true).is_err());
        assert!(resolve_window(Some("2024-02-01"), Some("2024-01-01"), 10, true).is_err());
    }

    #[test]
    fn test_prepare_synthetic_scenario() {
        let config = crate::cli::BatchConfig::from_toml_str(
            r#"
[[scenarios]]
name = "flat_two_zones"
type = "synthetic"
market = "flat"
zones = ["houston", "west"]
start = "2024-01-01"
end = "2024-01-02"

[scenarios.facility_mw]
west = 5.0
"#,
        )
        .unwrap();

        let (market, setup) = prepare_scenario(&config.scenarios[0], &config.model).unwrap();
        assert_eq!(zones_of(&market).len(), 2);
        assert_eq!(setup.facility.size_for("west"), Some(5.0));
        assert_eq!(
            setup.facility.size_for("houston"),
            Some(config.model.mining.default_facility_size_mw)
        );
        assert_eq!(setup.run(&market).unwrap().len(), 2 * 48);
    }

    #[test]
    fn test_setup_runs_flat_market() {
        let market = flat_market(&["houston", "west"]);
        let zones = zones_of(&market);
        assert_eq!(zones, vec!["houston".to_owned(), "west".to_owned()]);

        let setup = DispatchSetup {
            facility: build_facility(&zones, &[], 10.0, 30.0).unwrap(),
            min_profit_threshold: 0.0,
            contract: None,
        };
        let records = setup.run(&market).unwrap();

        assert_eq!(records.len(), 2 * 96);
        assert!(records.iter().all(|r| r.should_operate));
    }
}
