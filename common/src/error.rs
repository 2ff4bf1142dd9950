//! Error types for ticker construction.

use thiserror::Error;

/// A rate/timestamp pair that cannot form a usable ticker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid ticker: {reason}")]
pub struct InvalidTickerError {
    /// Why the ticker was rejected.
    pub reason: String,
}

impl InvalidTickerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
