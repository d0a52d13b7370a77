// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Fixed-price power contracts and their recurring block calendars.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Recurring calendar pattern during which a contract's fixed rate applies.
///
/// Day and hour are read from the timestamp's own UTC calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractBlock {
    /// Every hour of every day
    #[serde(rename = "7x24")]
    SevenBy24,
    /// Monday-Friday, 06:00-22:00
    #[serde(rename = "5x16")]
    FiveBy16,
    /// Saturday-Sunday, 06:00-22:00
    #[serde(rename = "2x16")]
    TwoBy16,
    /// Every day, 22:00-06:00
    #[serde(rename = "7x8")]
    SevenBy8,
}

impl ContractBlock {
    pub const ALL: [Self; 4] = [Self::SevenBy24, Self::FiveBy16, Self::TwoBy16, Self::SevenBy8];

    /// Whether the hour starting at `timestamp` falls inside this block
    pub fn covers(self, timestamp: DateTime<Utc>) -> bool {
        let hour = timestamp.hour();
        // ISO weekday: Monday = 1 .. Sunday = 7
        let iso_weekday = timestamp.weekday().number_from_monday();
        let daytime = (6..22).contains(&hour);

        match self {
            Self::SevenBy24 => true,
            Self::FiveBy16 => (1..=5).contains(&iso_weekday) && daytime,
            Self::TwoBy16 => (6..=7).contains(&iso_weekday) && daytime,
            Self::SevenBy8 => !daytime,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SevenBy24 => "7x24",
            Self::FiveBy16 => "5x16",
            Self::TwoBy16 => "2x16",
            Self::SevenBy8 => "7x8",
        }
    }
}

impl fmt::Display for ContractBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown contract block '{0}' (expected one of 7x24, 5x16, 2x16, 7x8)")]
pub struct ParseContractBlockError(pub String);

impl FromStr for ContractBlock {
    type Err = ParseContractBlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|block| block.as_str() == normalized)
            .ok_or_else(|| ParseContractBlockError(s.to_owned()))
    }
}

/// Terms of a fixed-price contract bound to a single load zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Zone the contract is bound to
    pub zone: String,
    pub block: ContractBlock,
    /// Contracted volume per covered hour (MWh); callers clamp to the zone's facility size
    pub size_mwh: f64,
    /// Fixed rate ($/MWh)
    pub rate_per_mwh: f64,
}

impl ContractTerms {
    /// Whether the contract applies to `zone` at `timestamp`
    pub fn applies(&self, zone: &str, timestamp: DateTime<Utc>) -> bool {
        self.zone == zone && self.block.covers(timestamp)
    }

    /// Cap the contracted size at the facility's power for the bound zone.
    ///
    /// Returns the adjusted terms and whether clamping happened.
    #[must_use]
    pub fn clamped_to(&self, facility_size_mw: f64) -> (Self, bool) {
        if self.size_mwh > facility_size_mw {
            let mut clamped = self.clone();
            clamped.size_mwh = facility_size_mw;
            (clamped, true)
        } else {
            (self.clone(), false)
        }
    }
}
