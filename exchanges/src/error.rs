//! Exchange adapter error types.

use thiserror::Error;
use tickerfeed_common::InvalidTickerError;

/// Errors returned by exchange adapters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    /// Adapter configuration is unusable (e.g. required credential missing).
    #[error("Invalid exchange config: {0}")]
    InvalidConfig(String),

    /// Upstream answered successfully but the payload failed validation.
    #[error("Invalid exchange response: {0}")]
    InvalidResponse(String),

    /// Transport failure, HTTP error status, or a provider "not successful" flag.
    #[error("Unknown exchange service error: {message}")]
    UnknownService {
        status: Option<u16>,
        message: String,
    },

    /// The rate for the requested pair cannot form a usable ticker.
    #[error(transparent)]
    InvalidTicker(#[from] InvalidTickerError),
}

impl ExchangeError {
    /// Error for an upstream that answered with a failure status.
    pub fn from_status(status: u16) -> Self {
        ExchangeError::UnknownService {
            status: Some(status),
            message: format!("Invalid response. Error {}", status),
        }
    }

    /// Error for a failure with no HTTP status (timeouts, connection errors).
    pub fn transport(message: impl Into<String>) -> Self {
        ExchangeError::UnknownService {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::UnknownService { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether a later call may succeed without changing configuration.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::UnknownService { .. } | ExchangeError::InvalidResponse(_)
        )
    }

    /// Stable error code for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::InvalidConfig(_) => "INVALID_EXCHANGE_CONFIG",
            ExchangeError::InvalidResponse(_) => "INVALID_EXCHANGE_RESPONSE",
            ExchangeError::UnknownService { .. } => "UNKNOWN_EXCHANGE_SERVICE",
            ExchangeError::InvalidTicker(_) => "INVALID_TICKER",
        }
    }
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
