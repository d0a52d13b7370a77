// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Alignment of the electricity price and hashprice series on a common hourly grid.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use hashdispatch_types::{ElectricityPricePoint, HashpricePoint, HourlyRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DispatchError, Result};

/// Inclusive UTC time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(DispatchError::InvalidParameter(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering whole calendar days, `start` 00:00 through the last hour of `end`.
    ///
    /// `start` must be strictly before `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(DispatchError::InvalidParameter(format!(
                "start date ({start}) must be before end date ({end})"
            )));
        }

        let last_instant = end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| DispatchError::InvalidParameter(format!("end date {end} overflows")))?
            .and_time(NaiveTime::MIN)
            .and_utc()
            - chrono::Duration::seconds(1);

        Ok(Self {
            start: start.and_time(NaiveTime::MIN).and_utc(),
            end: last_instant,
        })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Whole days between start and end (floor)
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Inner join of the electricity and hashprice series on timestamp, restricted to `window`.
///
/// Rows keep their zone grouping (zones in first-appearance order) and are sorted by
/// time within each zone. No resampling happens here: the hashprice series must
/// already be hourly.
pub fn join_series(
    electricity: &[ElectricityPricePoint],
    hashprice: &[HashpricePoint],
    window: &DateWindow,
) -> Result<Vec<HourlyRecord>> {
    let hashprice_by_hour: BTreeMap<DateTime<Utc>, f64> = hashprice
        .iter()
        .filter(|point| window.contains(point.timestamp))
        .map(|point| (point.timestamp, point.hashprice))
        .collect();

    let mut zone_order: HashMap<&str, usize> = HashMap::new();
    let mut joined: Vec<(usize, HourlyRecord)> = Vec::new();
    let mut electricity_in_window = 0_usize;

    for point in electricity {
        if !window.contains(point.timestamp) {
            continue;
        }
        electricity_in_window += 1;

        let next_index = zone_order.len();
        let zone_index = *zone_order.entry(point.load_zone.as_str()).or_insert(next_index);

        if let Some(&hashprice) = hashprice_by_hour.get(&point.timestamp) {
            joined.push((
                zone_index,
                HourlyRecord::new(
                    point.timestamp,
                    point.load_zone.clone(),
                    point.price_per_mwh,
                    hashprice,
                ),
            ));
        }
    }

    debug!(
        "Join inputs after window filter: {} electricity rows, {} hashprice hours",
        electricity_in_window,
        hashprice_by_hour.len()
    );

    if joined.is_empty() {
        return Err(DispatchError::EmptyResult(format!(
            "no overlapping hours between electricity and hashprice data in {} .. {}; \
             check date ranges and timezones",
            window.start, window.end
        )));
    }

    joined.sort_by_key(|(zone_index, record)| (*zone_index, record.timestamp));

    let records: Vec<HourlyRecord> = joined.into_iter().map(|(_, record)| record).collect();

    if let (Some(first), Some(last)) = (
        records.iter().map(|r| r.timestamp).min(),
        records.iter().map(|r| r.timestamp).max(),
    ) {
        info!(
            "Joined dataset: {} records from {} to {}",
            records.len(),
            first,
            last
        );
    }

    Ok(records)
}
