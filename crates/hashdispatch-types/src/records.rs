// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One hourly electricity price observation for a load zone, as delivered by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricityPricePoint {
    pub timestamp: DateTime<Utc>,
    pub load_zone: String,
    /// Real-time price ($/MWh)
    pub price_per_mwh: f64,
}

/// One hourly hashprice observation (already forward-filled from the daily feed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashpricePoint {
    pub timestamp: DateTime<Utc>,
    /// Mining revenue rate ($/TH/day)
    pub hashprice: f64,
}

/// A row of the aligned electricity/hashprice series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub timestamp: DateTime<Utc>,
    pub load_zone: String,
    /// $/MWh
    pub electricity_price: f64,
    /// $/TH/day
    pub hashprice: f64,
    /// Hour of day (0-23)
    pub hour: u32,
    /// Monday = 0
    pub day_of_week: u32,
    /// 1-12
    pub month: u32,
}

impl HourlyRecord {
    /// Create a record, deriving the calendar fields from the UTC timestamp
    pub fn new(
        timestamp: DateTime<Utc>,
        load_zone: impl Into<String>,
        electricity_price: f64,
        hashprice: f64,
    ) -> Self {
        Self {
            timestamp,
            load_zone: load_zone.into(),
            electricity_price,
            hashprice,
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            month: timestamp.month(),
        }
    }
}

/// An hourly record after the economics calculator and a dispatch decision ran over it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    #[serde(flatten)]
    pub base: HourlyRecord,

    /// Nameplate power of this record's zone (MW)
    pub facility_size_mw: f64,

    /// Facility-wide miner efficiency (W/TH)
    pub efficiency_w_per_th: f64,

    /// Hashrate of this record's zone (TH/s)
    pub hashrate_th: f64,

    pub hourly_revenue: f64,
    pub hourly_electricity_cost: f64,
    /// Signed, never floored at zero
    pub hourly_profit: f64,

    pub should_operate: bool,

    // Gated columns: zero on idle hours
    pub actual_revenue: f64,
    pub actual_cost: f64,
    pub actual_profit: f64,
}

impl DispatchRecord {
    /// Return a copy of this record with the operate decision replaced and the
    /// actual columns re-gated accordingly
    #[must_use]
    pub fn with_decision(&self, should_operate: bool) -> Self {
        let mut record = self.clone();
        record.should_operate = should_operate;
        if should_operate {
            record.actual_revenue = self.hourly_revenue;
            record.actual_cost = self.hourly_electricity_cost;
            record.actual_profit = self.hourly_profit;
        } else {
            record.actual_revenue = 0.0;
            record.actual_cost = 0.0;
            record.actual_profit = 0.0;
        }
        record
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.base.timestamp
    }

    pub fn load_zone(&self) -> &str {
        &self.base.load_zone
    }
}
