// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nameplate power per load zone plus one facility-wide miner efficiency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySpec {
    /// Zone -> nameplate power (MW)
    pub zones: BTreeMap<String, f64>,
    /// Miner efficiency shared by every zone (W/TH)
    pub efficiency_w_per_th: f64,
}

impl FacilitySpec {
    pub fn new(efficiency_w_per_th: f64) -> Self {
        Self {
            zones: BTreeMap::new(),
            efficiency_w_per_th,
        }
    }

    /// Builder-style helper to add a zone
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>, power_mw: f64) -> Self {
        self.zones.insert(zone.into(), power_mw);
        self
    }

    pub fn size_for(&self, zone: &str) -> Option<f64> {
        self.zones.get(zone).copied()
    }

    pub fn total_power_mw(&self) -> f64 {
        self.zones.values().sum()
    }
}
