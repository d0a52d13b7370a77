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

//! Dispatch simulator for HashDispatch
//!
//! Everything around the dispatch engine that touches the outside world:
//! loading market data, generating synthetic markets, and reporting results.
//!
//! # Features
//!
//! - **CSV Ingestion**: keyword column detection, time zone normalization, hourly averaging
//! - **Hashprice Expansion**: daily observations forward-filled to hourly
//! - **Market Scenarios**: seeded flat, diurnal, volatile and squeeze markets
//! - **Reporting**: comfy-table summaries, CSV dispatch export, JSON reports
//! - **Batch Runs**: TOML-defined scenario sets
//!
//! # Example
//!
//! ```ignore
//! use hashdispatch_sim::{cli::{DataLoader, SyntheticLoader}, MarketScenario, pipeline};
//!
//! let window = DateWindow::from_dates(start, end)?;
//! let market = SyntheticLoader { scenario: MarketScenario::Diurnal, zones, seed: 42 }
//!     .load(Some(&window))?;
//! let facility = pipeline::build_facility(&zones, &[], 50.0, 30.0)?;
//! let records = DispatchSetup { facility, min_profit_threshold: 0.0, contract: None }
//!     .run(&market)?;
//! ```

pub mod cli;
pub mod pipeline;
pub mod scenarios;

// Re-exports for convenience
pub use pipeline::{ContractOptions, DispatchSetup};
pub use scenarios::{MARKET_PRESETS, MarketPreset, MarketScenario};
