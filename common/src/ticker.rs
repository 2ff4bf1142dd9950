//! Bid/ask ticker and its constructor.

use serde::{Deserialize, Serialize};

use crate::error::InvalidTickerError;
use crate::monetary::Price;
use crate::time::Timestamp;

/// Current bid/ask for a currency pair.
///
/// Single-rate sources carry no spread, so tickers built by
/// [`Ticker::from_rate`] always have `bid == ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Price,
    pub ask: Price,
    pub timestamp: Timestamp,
}

impl Ticker {
    /// Build a ticker from a single provider rate.
    ///
    /// Fails unless the rate is present, finite and strictly positive and the
    /// timestamp is strictly after the Unix epoch. This is the last gate
    /// before a rate reaches a caller.
    pub fn from_rate(rate: Option<f64>, timestamp: Timestamp) -> Result<Self, InvalidTickerError> {
        let rate = rate.ok_or_else(|| InvalidTickerError::new("rate missing"))?;

        if rate.is_nan() || rate <= 0.0 {
            return Err(InvalidTickerError::new(format!("rate {rate} is not positive")));
        }

        if timestamp.timestamp_millis() <= 0 {
            return Err(InvalidTickerError::new(format!(
                "timestamp {} is not positive",
                timestamp.timestamp_millis()
            )));
        }

        let price = Price::from_f64(rate)
            .ok_or_else(|| InvalidTickerError::new(format!("rate {rate} is not representable")))?;
        if !price.is_positive() {
            return Err(InvalidTickerError::new(format!("rate {rate} rounds to zero")));
        }

        Ok(Self {
            bid: price,
            ask: price,
            timestamp,
        })
    }

    /// Mid price. Equal to bid and ask for single-rate tickers.
    pub fn mid(&self) -> Price {
        Price::new((self.bid.value() + self.ask.value()) / rust_decimal::Decimal::TWO)
    }
}
