//! Read-through exchange-rate lookup: local store first, external source on a miss.
//!
//! Persisted rates never expire. A miss always appends a new record, so the
//! store may hold several records for one pair; the newest one is served.

use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::currency::CurrencyCode;
use crate::exchange_rate::ExchangeRate;
use crate::source::{RateSource, SourceError};
use crate::store::{RateStore, StoreError};

type PairKey = (CurrencyCode, CurrencyCode);

/// How concurrent misses on the same pair are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissPolicy {
    /// Every miss queries the source and persists its own record.
    #[default]
    Uncoordinated,
    /// Misses on one pair queue behind a per-pair lock and re-check the store,
    /// so only the first of them reaches the source.
    SingleFlight,
}

impl FromStr for MissPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uncoordinated" => Ok(Self::Uncoordinated),
            "single-flight" | "single_flight" | "singleflight" => Ok(Self::SingleFlight),
            other => Err(format!(
                "unknown miss policy {other:?}, expected uncoordinated or single-flight"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct RateCache {
    store: Arc<dyn RateStore>,
    source: Arc<dyn RateSource>,
    policy: MissPolicy,
    flights: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl RateCache {
    pub fn new(store: Arc<dyn RateStore>, source: Arc<dyn RateSource>, policy: MissPolicy) -> Self {
        Self {
            store,
            source,
            policy,
            flights: Arc::new(DashMap::new()),
        }
    }

    pub fn policy(&self) -> MissPolicy {
        self.policy
    }

    pub async fn get_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<f64, LookupError> {
        if let Some(record) = self.store.find_rate(from, to).await? {
            debug!("Rate cache hit for {}/{}: {}", from, to, record.rate);
            return Ok(record.rate);
        }

        match self.policy {
            MissPolicy::Uncoordinated => self.fetch_and_store(from, to).await,
            MissPolicy::SingleFlight => {
                let _flight = self.enter_flight((from, to)).await;
                if let Some(record) = self.store.find_rate(from, to).await? {
                    debug!("Rate for {}/{} filled by a concurrent lookup", from, to);
                    return Ok(record.rate);
                }
                self.fetch_and_store(from, to).await
            }
        }
    }

    async fn fetch_and_store(&self, from: CurrencyCode, to: CurrencyCode) -> Result<f64, LookupError> {
        info!("Rate cache miss for {}/{}, querying source", from, to);

        let rate = self
            .source
            .fetch_rate(from, to)
            .await
            .inspect_err(|err| warn!("Rate source failed for {}/{}: {}", from, to, err))?;

        let record = ExchangeRate::new(from, to, rate);
        self.store.insert_rate(&record).await?;
        info!("Stored rate {} for {}/{} as {}", record.rate, from, to, record.id);

        Ok(record.rate)
    }

    async fn enter_flight(&self, key: PairKey) -> FlightGuard {
        let lock = Arc::clone(
            self.flights
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        // Built before waiting so a caller dropped while queued still releases the entry.
        let mut flight = FlightGuard {
            held: None,
            key,
            lock,
            flights: Arc::clone(&self.flights),
        };
        let acquire = Arc::clone(&flight.lock).lock_owned();
        flight.held = Some(acquire.await);

        flight
    }

    #[cfg(test)]
    fn flights_in_progress(&self) -> usize {
        self.flights.len()
    }
}

/// A caller's place in a pair's flight, queued or holding the lock. The map
/// entry goes away with the last of them.
struct FlightGuard {
    held: Option<OwnedMutexGuard<()>>,
    key: PairKey,
    lock: Arc<Mutex<()>>,
    flights: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        // The map and this guard own the only two references when nobody else is queued.
        self.flights.remove_if(&self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}
