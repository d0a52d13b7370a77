// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HashDispatch.

//! Error types for the dispatch engine

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// Non-positive facility size or efficiency, malformed contract or policy
    /// parameters, mismatched series lengths
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The electricity/hashprice join produced no rows
    #[error("empty join result: {0}")]
    EmptyResult(String),

    /// A requested window or series contained no data
    #[error("no data: {0}")]
    NoData(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
