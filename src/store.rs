//! Persistence ports and their Postgres and in-memory implementations.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::currency::CurrencyCode;
use crate::exchange_rate::ExchangeRate;
use crate::student::{Student, StudentFields};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("stored data is invalid: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait RateStore: Send + Sync {
    /// Most recently persisted record for the pair, if any.
    async fn find_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<ExchangeRate>, StoreError>;

    /// Appends a record. There is no uniqueness on the pair.
    async fn insert_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError>;

    /// Number of records held for the pair. No route reads it; it is a
    /// diagnostics accessor that tests use to observe duplicate appends.
    async fn count_rates(&self, from: CurrencyCode, to: CurrencyCode) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn insert_student(&self, fields: &StudentFields) -> Result<Student, StoreError>;

    /// `None` when no student has `id`; nothing is created in that case.
    async fn update_student(
        &self,
        id: i64,
        fields: &StudentFields,
    ) -> Result<Option<Student>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_student(&self, id: i64) -> Result<bool, StoreError>;

    async fn find_student(&self, id: i64) -> Result<Option<Student>, StoreError>;

    async fn list_students(&self) -> Result<Vec<Student>, StoreError>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Titles of items whose mean review rating (0 without reviews) is below `threshold`.
    async fn titles_with_average_rating_below(
        &self,
        threshold: f64,
    ) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}
