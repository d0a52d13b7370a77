// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Mining economics: hashrate from facility parameters, hourly revenue, cost and profit,
//! and the base profitability dispatch over a joined dataset.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hashdispatch_types::{ContractTerms, DispatchRecord, FacilitySpec, HourlyRecord};
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::stats::{daily_to_hourly, mw_to_kw};

const WATTS_PER_KILOWATT: f64 = 1000.0;

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Hashrate (TH/s) a facility of `power_mw` can sustain at `efficiency_w_per_th`
pub fn hashrate(power_mw: f64, efficiency_w_per_th: f64) -> Result<f64> {
    if !is_positive(power_mw) {
        return Err(DispatchError::InvalidParameter(format!(
            "facility size must be positive, got {power_mw} MW"
        )));
    }
    if !is_positive(efficiency_w_per_th) {
        return Err(DispatchError::InvalidParameter(format!(
            "efficiency must be positive, got {efficiency_w_per_th} W/TH"
        )));
    }
    Ok(mw_to_kw(power_mw) * WATTS_PER_KILOWATT / efficiency_w_per_th)
}

/// Mining revenue for one hour; hashprice is quoted per TH per day
pub fn hourly_revenue(hashrate_th: f64, hashprice_per_th_per_day: f64) -> f64 {
    daily_to_hourly(hashrate_th * hashprice_per_th_per_day)
}

/// Electricity cost of running `power_mw` for one hour.
///
/// Outside the contract's zone or block calendar the full draw is billed at spot.
/// Inside it, the contracted volume is billed at the fixed rate and any remainder at spot.
pub fn hourly_electricity_cost(
    power_mw: f64,
    price_per_mwh: f64,
    zone: &str,
    timestamp: DateTime<Utc>,
    contract: Option<&ContractTerms>,
) -> f64 {
    match contract {
        Some(terms) if terms.applies(zone, timestamp) => {
            if terms.size_mwh >= power_mw {
                power_mw * terms.rate_per_mwh
            } else {
                terms.size_mwh * terms.rate_per_mwh + (power_mw - terms.size_mwh) * price_per_mwh
            }
        }
        Some(_) | None => power_mw * price_per_mwh,
    }
}

/// Signed hourly profit
pub fn hourly_profit(revenue: f64, cost: f64) -> f64 {
    revenue - cost
}

/// Reject contracts that cannot be priced.
///
/// The contracted size is not compared with the facility here; callers clamp it first.
pub fn validate_contract(contract: &ContractTerms) -> Result<()> {
    if contract.zone.trim().is_empty() {
        return Err(DispatchError::InvalidParameter(
            "contract zone must not be empty".to_owned(),
        ));
    }
    if !is_positive(contract.size_mwh) {
        return Err(DispatchError::InvalidParameter(format!(
            "contract size must be positive, got {} MWh",
            contract.size_mwh
        )));
    }
    if !is_positive(contract.rate_per_mwh) {
        return Err(DispatchError::InvalidParameter(format!(
            "contract rate must be positive, got {} $/MWh",
            contract.rate_per_mwh
        )));
    }
    Ok(())
}

/// Sum of the hashrates of every distinct zone present in `records`.
///
/// Informational only; no dispatch decision depends on it.
pub fn total_hashrate(records: &[DispatchRecord]) -> f64 {
    let mut seen: HashMap<&str, f64> = HashMap::new();
    for record in records {
        seen.entry(record.load_zone()).or_insert(record.hashrate_th);
    }
    seen.values().sum()
}

/// Compute per-hour economics for every record and apply the base rule
/// "operate iff hourly profit exceeds `min_profit_threshold`".
///
/// Each zone uses its own facility size from `facility`; zones share nothing.
/// Output order matches input order.
pub fn run_dispatch(
    records: &[HourlyRecord],
    facility: &FacilitySpec,
    min_profit_threshold: f64,
    contract: Option<&ContractTerms>,
) -> Result<Vec<DispatchRecord>> {
    if records.is_empty() {
        return Err(DispatchError::NoData(
            "no hourly records to dispatch".to_owned(),
        ));
    }
    if let Some(terms) = contract {
        validate_contract(terms)?;
    }

    info!("Running dispatch over {} hours", records.len());

    // zone -> (size, hashrate)
    let mut zone_params: HashMap<&str, (f64, f64)> = HashMap::new();
    let mut zone_order: Vec<&str> = Vec::new();
    for record in records {
        let zone = record.load_zone.as_str();
        if zone_params.contains_key(zone) {
            continue;
        }
        let size_mw = facility.size_for(zone).ok_or_else(|| {
            DispatchError::InvalidParameter(format!("no facility size configured for zone '{zone}'"))
        })?;
        let zone_hashrate = hashrate(size_mw, facility.efficiency_w_per_th)?;
        zone_params.insert(zone, (size_mw, zone_hashrate));
        zone_order.push(zone);
    }

    let mut dispatched = Vec::with_capacity(records.len());
    for record in records {
        let (size_mw, zone_hashrate) = zone_params
            .get(record.load_zone.as_str())
            .copied()
            .ok_or_else(|| {
                DispatchError::InvalidParameter(format!(
                    "no facility size configured for zone '{}'",
                    record.load_zone
                ))
            })?;

        let revenue = hourly_revenue(zone_hashrate, record.hashprice);
        let cost = hourly_electricity_cost(
            size_mw,
            record.electricity_price,
            &record.load_zone,
            record.timestamp,
            contract,
        );
        let profit = hourly_profit(revenue, cost);
        let operate = profit > min_profit_threshold;

        dispatched.push(DispatchRecord {
            base: record.clone(),
            facility_size_mw: size_mw,
            efficiency_w_per_th: facility.efficiency_w_per_th,
            hashrate_th: zone_hashrate,
            hourly_revenue: revenue,
            hourly_electricity_cost: cost,
            hourly_profit: profit,
            should_operate: operate,
            actual_revenue: if operate { revenue } else { 0.0 },
            actual_cost: if operate { cost } else { 0.0 },
            actual_profit: if operate { profit } else { 0.0 },
        });
    }

    for zone in &zone_order {
        let (size_mw, zone_hashrate) = zone_params[zone];
        let zone_rows = dispatched.iter().filter(|r| r.load_zone() == *zone);
        let (hours, operating) = zone_rows.fold((0_usize, 0_usize), |(h, o), r| {
            (h + 1, o + usize::from(r.should_operate))
        });
        info!(
            "Zone {}: {:.1} MW, {:.0} TH/s, operating {}/{} hours",
            zone, size_mw, zone_hashrate, operating, hours
        );
    }

    let operating_total = dispatched.iter().filter(|r| r.should_operate).count();
    let capacity_factor = operating_total as f64 / dispatched.len() as f64;
    info!("Capacity factor: {:.1}%", capacity_factor * 100.0);
    if let Some(terms) = contract {
        debug!(
            "Contract {} in {}: {} MWh at ${}/MWh",
            terms.block, terms.zone, terms.size_mwh, terms.rate_per_mwh
        );
    }

    Ok(dispatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use hashdispatch_types::ContractBlock;

    fn monday_at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn contract(size_mwh: f64, rate: f64) -> ContractTerms {
        ContractTerms {
            zone: "houston".to_owned(),
            block: ContractBlock::FiveBy16,
            size_mwh,
            rate_per_mwh: rate,
        }
    }

    #[test]
    fn test_hashrate_formula_and_monotonicity() {
        let base = hashrate(10.0, 30.0).unwrap();
        assert!((base - 333_333.333).abs() < 0.01);

        assert!(hashrate(10.0, 25.0).unwrap() > base);
        assert!(hashrate(12.0, 30.0).unwrap() > base);
    }

    #[test]
    fn test_hashrate_rejects_non_positive_inputs() {
        assert!(matches!(hashrate(0.0, 30.0), Err(DispatchError::InvalidParameter(_))));
        assert!(matches!(hashrate(10.0, -1.0), Err(DispatchError::InvalidParameter(_))));
        assert!(hashrate(f64::NAN, 30.0).is_err());
    }

    #[test]
    fn test_revenue_is_daily_hashprice_over_24() {
        let revenue = hourly_revenue(333_333.333_333, 0.06);
        assert!((revenue - 833.333).abs() < 0.01);
    }

    #[test]
    fn test_partial_hedge_blends_inside_block_only() {
        let terms = contract(30.0, 40.0);
        // Monday 10:00 is inside 5x16, Monday 03:00 is not
        let inside = hourly_electricity_cost(50.0, 60.0, "houston", monday_at(10), Some(&terms));
        let outside = hourly_electricity_cost(50.0, 60.0, "houston", monday_at(3), Some(&terms));

        assert!((inside - 2400.0).abs() < 1e-9);
        assert!((outside - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_hedge_ignores_spot() {
        let terms = contract(50.0, 40.0);
        for spot in [-20.0, 0.0, 60.0, 9000.0] {
            let cost = hourly_electricity_cost(50.0, spot, "houston", monday_at(10), Some(&terms));
            assert!((cost - 2000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_contract_in_other_zone_is_ignored() {
        let terms = contract(30.0, 40.0);
        let cost = hourly_electricity_cost(50.0, 60.0, "west", monday_at(10), Some(&terms));
        assert!((cost - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_contract() {
        assert!(validate_contract(&contract(30.0, 40.0)).is_ok());
        assert!(validate_contract(&contract(0.0, 40.0)).is_err());
        assert!(validate_contract(&contract(30.0, 0.0)).is_err());
    }

    #[test]
    fn test_run_dispatch_zones_are_independent() {
        let records = vec![
            HourlyRecord::new(monday_at(0), "houston", 40.0, 0.06),
            HourlyRecord::new(monday_at(0), "west", 40.0, 0.06),
            HourlyRecord::new(monday_at(1), "houston", 200.0, 0.06),
        ];
        let facility = FacilitySpec::new(30.0)
            .with_zone("houston", 10.0)
            .with_zone("west", 20.0);

        let dispatched = run_dispatch(&records, &facility, 0.0, None).unwrap();

        assert_eq!(dispatched.len(), 3);
        assert_eq!(dispatched[1].load_zone(), "west");
        assert!((dispatched[1].hashrate_th - 2.0 * dispatched[0].hashrate_th).abs() < 1e-6);
        assert!(dispatched[0].should_operate);
        assert!(!dispatched[2].should_operate);
        assert_eq!(dispatched[2].actual_profit, 0.0);
        assert!(dispatched[2].hourly_profit < 0.0);

        for record in &dispatched {
            assert_eq!(
                record.hourly_profit,
                record.hourly_revenue - record.hourly_electricity_cost
            );
        }

        let total = total_hashrate(&dispatched);
        assert!((total - 3.0 * dispatched[0].hashrate_th).abs() < 1e-6);
    }

    #[test]
    fn test_run_dispatch_unknown_zone_fails() {
        let records = vec![HourlyRecord::new(monday_at(0), "north", 40.0, 0.06)];
        let facility = FacilitySpec::new(30.0).with_zone("houston", 10.0);

        let err = run_dispatch(&records, &facility, 0.0, None).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParameter(_)));
    }
}
