//! Error types for the pillsplit_core library.

use crate::ParentId;
use chrono::NaiveDate;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pillsplit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two custody claims for the same morning, or a title naming both parents
    #[error("Conflicting custody on {date}: claimed by both {first} and {second}")]
    ConflictingCustody {
        date: NaiveDate,
        first: ParentId,
        second: ParentId,
    },

    /// Non-positive supply days or refill threshold
    #[error("Invalid supply: {0}")]
    InvalidSupply(String),

    /// The custody window does not reach far enough to answer the question.
    /// Widen the window and retry.
    #[error("Insufficient schedule data: {0}")]
    InsufficientScheduleData(String),

    /// More pills distributed than the fill ever held
    #[error("Ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    /// Rejected ledger write (bad quantity, unknown fill)
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller can recover by supplying a wider custody window.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InsufficientScheduleData(_))
    }
}
