use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::currency::CurrencyCode;

/// A persisted exchange rate for one currency pair.
///
/// Records are append-only: a cache miss always inserts a fresh record and
/// nothing ever updates or deletes one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(from: CurrencyCode, to: CurrencyCode, rate: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            rate,
            updated_at: Utc::now(),
        }
    }
}
