//! Crate-wide error type.
//!
//! Bad numbers and dates never end up here: they degrade to sentinels in
//! `util`/`dates`. This enum covers I/O, the two source fetches, and config.

use std::io;
use thiserror::Error;

use crate::types::SourceKind;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{kind} fetch failed: {message}")]
    Source { kind: SourceKind, message: String },

    #[error("Both sources failed; nothing to load")]
    AllSourcesFailed,

    #[error("No data loaded")]
    NoData,
}

pub type AppResult<T> = Result<T, AppError>;
