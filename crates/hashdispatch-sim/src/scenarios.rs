// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Synthetic market scenarios for demos and regression runs.
//!
//! - **Flat**: constant $40/MWh power and 0.06 $/TH/day hashprice
//! - **Diurnal**: cheap nights, afternoon peak, mild noise
//! - **Volatile**: scarcity spikes and negative-price hours
//! - **Squeeze**: hashprice declining across the window
//!
//! Every scenario is seeded, so the same seed always yields the same series.

use chrono::{DateTime, Duration, Timelike, Utc};
use hashdispatch_core::{DateWindow, ElectricityPricePoint, HashpricePoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketScenario {
    Flat,
    Diurnal,
    Volatile,
    Squeeze,
}

impl MarketScenario {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "Flat",
            Self::Diurnal => "Diurnal",
            Self::Volatile => "Volatile",
            Self::Squeeze => "Hashprice Squeeze",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Flat => "Constant $40/MWh power and 0.06 $/TH/day hashprice",
            Self::Diurnal => "Cheap nights (0-6), moderate day, expensive afternoon peak (14-20)",
            Self::Volatile => "Scarcity spikes up to $1000/MWh and occasional negative prices",
            Self::Squeeze => "Moderate power, hashprice falling from 0.07 to 0.035 $/TH/day",
        }
    }

    /// Look up a scenario by id (case-insensitive)
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "flat" => Some(Self::Flat),
            "diurnal" | "daily" => Some(Self::Diurnal),
            "volatile" | "spiky" => Some(Self::Volatile),
            "squeeze" | "halving" => Some(Self::Squeeze),
            _ => None,
        }
    }

    /// Hourly electricity prices for each zone and a matching hourly hashprice series
    /// covering every whole hour of `window`
    pub fn generate(
        &self,
        zones: &[String],
        window: &DateWindow,
        seed: u64,
    ) -> (Vec<ElectricityPricePoint>, Vec<HashpricePoint>) {
        let hours = hour_grid(window);
        let mut rng = StdRng::seed_from_u64(seed);

        let hashprice = self.hashprice_series(&hours, &mut rng);

        let mut electricity = Vec::with_capacity(hours.len() * zones.len());
        for (zone_index, zone) in zones.iter().enumerate() {
            // Zones differ by a fixed basis so multi-zone runs are not identical
            let basis = 1.0 + 0.05 * zone_index as f64;
            for &timestamp in &hours {
                electricity.push(ElectricityPricePoint {
                    timestamp,
                    load_zone: zone.clone(),
                    price_per_mwh: self.electricity_price(timestamp, &mut rng) * basis,
                });
            }
        }

        (electricity, hashprice)
    }

    fn electricity_price(&self, timestamp: DateTime<Utc>, rng: &mut StdRng) -> f64 {
        let hour = timestamp.hour();
        match self {
            Self::Flat => 40.0,
            Self::Diurnal => {
                let base = match hour {
                    0..=5 => 18.0,
                    6..=13 => 35.0,
                    14..=19 => 95.0,
                    _ => 30.0,
                };
                base * (1.0 + rng.gen_range(-0.10..0.10))
            }
            Self::Volatile => {
                let roll: f64 = rng.r#gen();
                if roll < 0.04 {
                    rng.gen_range(200.0..1000.0)
                } else if roll < 0.10 {
                    rng.gen_range(-30.0..0.0)
                } else {
                    rng.gen_range(20.0..60.0)
                }
            }
            Self::Squeeze => {
                let base = if (14..=19).contains(&hour) { 55.0 } else { 35.0 };
                base * (1.0 + rng.gen_range(-0.05..0.05))
            }
        }
    }

    /// Hashprice is quoted daily, so every hour of a day carries the same value
    fn hashprice_series(&self, hours: &[DateTime<Utc>], rng: &mut StdRng) -> Vec<HashpricePoint> {
        let total_days = hours.len().div_ceil(24).max(1);
        let mut daily = Vec::with_capacity(total_days);
        let mut walk: f64 = 0.06;

        for day in 0..total_days {
            let value = match self {
                Self::Flat => 0.06,
                Self::Diurnal => 0.055 * (1.0 + rng.gen_range(-0.02..0.02)),
                Self::Volatile => {
                    walk = (walk * (1.0 + rng.gen_range(-0.04..0.04))).clamp(0.03, 0.10);
                    walk
                }
                Self::Squeeze => {
                    let progress = day as f64 / total_days as f64;
                    0.07 - 0.035 * progress
                }
            };
            daily.push(value);
        }

        hours
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| HashpricePoint {
                timestamp,
                hashprice: daily[(i / 24).min(total_days - 1)],
            })
            .collect()
    }
}

/// Scenario preset with metadata
#[derive(Debug, Clone)]
pub struct MarketPreset {
    pub id: &'static str,
    pub scenario: MarketScenario,
}

/// Available market presets
pub const MARKET_PRESETS: &[MarketPreset] = &[
    MarketPreset {
        id: "flat",
        scenario: MarketScenario::Flat,
    },
    MarketPreset {
        id: "diurnal",
        scenario: MarketScenario::Diurnal,
    },
    MarketPreset {
        id: "volatile",
        scenario: MarketScenario::Volatile,
    },
    MarketPreset {
        id: "squeeze",
        scenario: MarketScenario::Squeeze,
    },
];

/// Whole hours from the window start through its end
fn hour_grid(window: &DateWindow) -> Vec<DateTime<Utc>> {
    let mut hours = Vec::new();
    let mut current = window.start;
    while current <= window.end {
        hours.push(current);
        current += Duration::hours(1);
    }
    hours
}

/// One line per preset: id and description
pub fn preset_listing() -> String {
    MARKET_PRESETS
        .iter()
        .map(|preset| format!("  {}: {}", preset.id, preset.scenario.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window(days: u32) -> DateWindow {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DateWindow::from_dates(start, start + chrono::Days::new(u64::from(days))).unwrap()
    }

    fn zones(names: &[&str]) -> Vec<String> {
        names.iter().map(|z| (*z).to_owned()).collect()
    }

    #[test]
    fn test_flat_is_constant() {
        let (electricity, hashprice) = MarketScenario::Flat.generate(&zones(&["houston"]), &window(2), 1);

        assert_eq!(electricity.len(), 72);
        assert_eq!(hashprice.len(), 72);
        assert!(electricity.iter().all(|p| p.price_per_mwh == 40.0));
        assert!(hashprice.iter().all(|p| p.hashprice == 0.06));
    }

    #[test]
    fn test_same_seed_same_series() {
        let zones = zones(&["houston", "west"]);
        let a = MarketScenario::Volatile.generate(&zones, &window(5), 7);
        let b = MarketScenario::Volatile.generate(&zones, &window(5), 7);
        let c = MarketScenario::Volatile.generate(&zones, &window(5), 8);

        assert_eq!(a, b);
        assert_ne!(a.0, c.0);
    }

    #[test]
    fn test_volatile_hashprice_walk_stays_bounded() {
        let (_, hashprice) = MarketScenario::Volatile.generate(&zones(&["houston"]), &window(60), 11);
        assert!(hashprice.iter().all(|p| (0.03..=0.10).contains(&p.hashprice)));
        // Constant within a day, moving between days
        assert_eq!(hashprice[0].hashprice, hashprice[23].hashprice);
        assert!(hashprice.windows(24).any(|w| w[0].hashprice != w[23].hashprice));
    }

    #[test]
    fn test_diurnal_peak_is_expensive() {
        let (electricity, _) = MarketScenario::Diurnal.generate(&zones(&["houston"]), &window(3), 3);
        for point in &electricity {
            let hour = point.timestamp.hour();
            if (14..=19).contains(&hour) {
                assert!(point.price_per_mwh > 80.0);
            } else if hour < 6 {
                assert!(point.price_per_mwh < 25.0);
            }
        }
    }

    #[test]
    fn test_squeeze_hashprice_declines() {
        let (_, hashprice) = MarketScenario::Squeeze.generate(&zones(&["houston"]), &window(10), 1);
        let first = hashprice.first().unwrap().hashprice;
        let last = hashprice.last().unwrap().hashprice;
        assert!(first > last);
        assert!(hashprice.windows(2).all(|w| w[0].hashprice >= w[1].hashprice));
    }

    #[test]
    fn test_preset_listing_describes_every_preset() {
        let listing = preset_listing();
        assert_eq!(listing.lines().count(), MARKET_PRESETS.len());
        assert!(listing.contains("  volatile: Scarcity spikes"));
    }

    #[test]
    fn test_presets_resolve() {
        for preset in MARKET_PRESETS {
            assert_eq!(MarketScenario::from_id(preset.id), Some(preset.scenario));
        }
        assert_eq!(MarketScenario::from_id("nope"), None);
    }
}
