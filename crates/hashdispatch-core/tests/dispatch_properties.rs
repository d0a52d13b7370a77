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

//! End-to-end checks of the join -> dispatch -> policy -> metrics -> backtest pipeline.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use hashdispatch_core::{
    ContractBlock, ContractTerms, DateWindow, DispatchPolicy, DispatchRecord,
    ElectricityPricePoint, FacilitySpec, HashpricePoint, HourlyRecord, ModelConfig, PaybackPeriod,
    backtest, compare_policies, default_policies, evaluate, hashrate, join_series,
    rolling_backtest, roi_metrics, run_dispatch, summarize,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Constant market over `hours` hours for one zone
fn flat_market(
    zone: &str,
    hours: i64,
    price: f64,
    hashprice: f64,
) -> (Vec<ElectricityPricePoint>, Vec<HashpricePoint>) {
    let electricity = (0..hours)
        .map(|h| ElectricityPricePoint {
            timestamp: start() + Duration::hours(h),
            load_zone: zone.to_owned(),
            price_per_mwh: price,
        })
        .collect();
    let hashprices = (0..hours)
        .map(|h| HashpricePoint {
            timestamp: start() + Duration::hours(h),
            hashprice,
        })
        .collect();
    (electricity, hashprices)
}

/// Price swings through the day: cheap nights, expensive afternoons
fn diurnal_records(days: i64) -> Vec<HourlyRecord> {
    (0..days * 24)
        .map(|h| {
            let hour_of_day = h % 24;
            let price = if (14..20).contains(&hour_of_day) {
                120.0
            } else if hour_of_day < 6 {
                15.0
            } else {
                45.0
            };
            HourlyRecord::new(start() + Duration::hours(h), "houston", price, 0.06)
        })
        .collect()
}

fn dispatch(records: &[HourlyRecord]) -> Vec<DispatchRecord> {
    let facility = FacilitySpec::new(30.0).with_zone("houston", 10.0);
    run_dispatch(records, &facility, 0.0, None).unwrap()
}

#[test]
fn test_end_to_end_flat_market() {
    let (electricity, hashprices) = flat_market("houston", 24 * 7, 40.0, 0.06);
    let window = DateWindow::from_dates(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
    )
    .unwrap();

    let joined = join_series(&electricity, &hashprices, &window).unwrap();
    assert_eq!(joined.len(), 24 * 7);

    let facility = FacilitySpec::new(30.0).with_zone("houston", 10.0);
    let dispatched = run_dispatch(&joined, &facility, 0.0, None).unwrap();

    for record in &dispatched {
        assert!((record.hashrate_th - 333_333.333).abs() < 0.01);
        assert!((record.hourly_revenue - 833.333).abs() < 0.01);
        assert!((record.hourly_electricity_cost - 400.0).abs() < 1e-9);
        assert!((record.hourly_profit - 433.333).abs() < 0.01);
        assert!(record.should_operate);
    }

    let summary = summarize(&dispatched).unwrap();
    assert_eq!(summary.operating_hours, 24 * 7);
    assert!((summary.capacity_factor - 1.0).abs() < 1e-12);
    assert!((summary.avg_electricity_price - 40.0).abs() < 1e-9);
    assert_eq!(summary.profitable_hours, 24 * 7);
}

#[test]
fn test_hashrate_is_monotone() {
    let efficiencies = [15.0, 20.0, 25.0, 30.0, 38.0];
    for pair in efficiencies.windows(2) {
        assert!(hashrate(50.0, pair[0]).unwrap() > hashrate(50.0, pair[1]).unwrap());
    }
    let sizes = [1.0, 5.0, 50.0, 200.0];
    for pair in sizes.windows(2) {
        assert!(hashrate(pair[0], 30.0).unwrap() < hashrate(pair[1], 30.0).unwrap());
    }
}

#[test]
fn test_profit_identity_with_contract() {
    let records = diurnal_records(14);
    let facility = FacilitySpec::new(30.0).with_zone("houston", 50.0);
    let contract = ContractTerms {
        zone: "houston".to_owned(),
        block: ContractBlock::FiveBy16,
        size_mwh: 30.0,
        rate_per_mwh: 40.0,
    };

    let dispatched = run_dispatch(&records, &facility, 0.0, Some(&contract)).unwrap();
    for record in &dispatched {
        assert_eq!(
            record.hourly_profit,
            record.hourly_revenue - record.hourly_electricity_cost
        );
        let spot = 50.0 * record.base.electricity_price;
        if contract.block.covers(record.timestamp()) {
            let blended = 30.0 * 40.0 + 20.0 * record.base.electricity_price;
            assert!((record.hourly_electricity_cost - blended).abs() < 1e-9);
        } else {
            assert!((record.hourly_electricity_cost - spot).abs() < 1e-9);
        }
    }
}

#[test]
fn test_threshold_policy_matches_profit_set() {
    let dispatched = dispatch(&diurnal_records(10));
    let threshold = 100.0;
    let decisions = DispatchPolicy::Threshold { threshold }
        .decide(&dispatched)
        .unwrap();

    for (record, operate) in dispatched.iter().zip(&decisions) {
        assert_eq!(*operate, record.hourly_profit > threshold);
    }

    let metrics = evaluate(&dispatched, &decisions).unwrap();
    let expected_hours = dispatched.iter().filter(|r| r.hourly_profit > threshold).count();
    assert_eq!(metrics.operating_hours, expected_hours);
    assert!(
        (metrics.capacity_factor - expected_hours as f64 / dispatched.len() as f64).abs() < 1e-12
    );
}

#[test]
fn test_all_idle_is_zero_not_nan() {
    let dispatched = dispatch(&diurnal_records(2));
    let decisions = vec![false; dispatched.len()];
    let metrics = evaluate(&dispatched, &decisions).unwrap();

    assert_eq!(metrics.total_profit, 0.0);
    assert_eq!(metrics.capacity_factor, 0.0);
    assert_eq!(metrics.avg_profit_per_operating_hour, 0.0);
    assert!(metrics.profit_margin.is_finite());
}

#[test]
fn test_roi_empty_and_never() {
    let profitable = dispatch(&diurnal_records(30));
    assert!(roi_metrics(&profitable, 0.0).is_none());
    let roi = roi_metrics(&profitable, 5_000_000.0).unwrap();
    assert!(matches!(roi.payback_period, PaybackPeriod::Years(_)));

    // Power far above mining revenue: nothing operates, no profit
    let expensive: Vec<HourlyRecord> = (0..48)
        .map(|h| HourlyRecord::new(start() + Duration::hours(h), "houston", 500.0, 0.06))
        .collect();
    let idle = dispatch(&expensive);
    let roi = roi_metrics(&idle, 5_000_000.0).unwrap();
    assert_eq!(roi.payback_period, PaybackPeriod::Never);
}

#[test]
fn test_rolling_window_count() {
    let policy = DispatchPolicy::Threshold { threshold: 0.0 };
    for days in [20_i64, 30, 31, 37, 44, 90] {
        // first..last spans exactly `days` days
        let records: Vec<HourlyRecord> = (0..=days * 24)
            .map(|h| HourlyRecord::new(start() + Duration::hours(h), "houston", 40.0, 0.06))
            .collect();
        let dispatched = dispatch(&records);
        let windows = rolling_backtest(&dispatched, &policy, 30, 7).unwrap();

        let expected = if days >= 30 { (days - 30) / 7 + 1 } else { 0 };
        assert_eq!(windows.len() as i64, expected, "span of {days} days");
    }
}

#[test]
fn test_default_policies_compare_and_backtest() {
    let dispatched = dispatch(&diurnal_records(45));
    let config = ModelConfig::default();
    let policies = default_policies(&config);

    let comparison = compare_policies(&dispatched, &policies).unwrap();
    assert_eq!(comparison.results.len(), policies.len());

    let best = comparison.best_result().unwrap();
    for result in &comparison.results {
        assert!(best.performance.total_profit >= result.performance.total_profit);
    }

    let result = backtest(&dispatched, &best.policy, None).unwrap();
    assert!((result.performance.total_profit - best.performance.total_profit).abs() < 1e-6);
    assert_eq!(result.data_points, dispatched.len());
}
