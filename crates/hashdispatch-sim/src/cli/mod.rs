// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! CLI module for the dispatch simulator command-line interface.

pub mod args;
pub mod config;
pub mod data_loaders;
pub mod formatters;

pub use args::{
    BacktestArgs, BatchArgs, Cli, Commands, CompareArgs, DataArgs, ExampleConfigArgs, RunArgs,
};
pub use config::{BatchConfig, ScenarioConfig, ScenarioSource};
pub use data_loaders::{CsvLoader, DataLoader, MarketData, SyntheticLoader};
pub use formatters::{CsvFormatter, JsonFormatter, TableFormatter};
