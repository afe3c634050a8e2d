//! External exchange-rate sources consulted on a cache miss.

mod cbr;
mod exchangerate_api;

pub use cbr::{CbrDailySource, DEFAULT_CBR_URL};
pub use exchangerate_api::ExchangeRateApiSource;

use async_trait::async_trait;
use thiserror::Error;

use crate::currency::CurrencyCode;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no rate available for {from} -> {to}")]
    NoRate { from: CurrencyCode, to: CurrencyCode },
    #[error("request to rate source failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate source answered with status {0}")]
    Status(u16),
    #[error("malformed rate source response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Port for the slow side of the read-through cache.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Units of `to` obtained for one unit of `from`.
    async fn fetch_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<f64, SourceError>;
}

fn checked_rate(rate: f64) -> Result<f64, SourceError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(rate)
    } else {
        Err(SourceError::malformed(format!("rate {rate} is not a non-negative number")))
    }
}
