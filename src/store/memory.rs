use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ItemStore, RateStore, StoreError, StoreHealth, StudentStore};
use crate::currency::CurrencyCode;
use crate::exchange_rate::ExchangeRate;
use crate::item::{Item, Review};
use crate::student::{Student, StudentFields};

/// Process-local store used with `STORAGE=memory` and throughout the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rates: RwLock<Vec<ExchangeRate>>,
    students: RwLock<Students>,
    items: RwLock<Vec<Item>>,
}

#[derive(Debug, Default)]
struct Students {
    next_id: i64,
    rows: BTreeMap<i64, Student>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an item with the given review ratings and returns its id.
    ///
    /// No route creates items, so with `STORAGE=memory` `/titles` answers `[]`
    /// until something calls this. Tests use it to build their fixtures.
    pub async fn add_item(&self, title: &str, ratings: &[i32]) -> i64 {
        let mut items = self.items.write().await;
        let id = items.len() as i64 + 1;
        items.push(Item {
            id,
            title: title.to_string(),
            reviews: ratings.iter().map(|&rating| Review { rating }).collect(),
        });
        id
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn find_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<ExchangeRate>, StoreError> {
        let rates = self.rates.read().await;
        Ok(rates
            .iter()
            .filter(|rate| rate.from == from && rate.to == to)
            .max_by(|a, b| a.updated_at.cmp(&b.updated_at))
            .cloned())
    }

    async fn insert_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError> {
        self.rates.write().await.push(rate.clone());
        Ok(())
    }

    async fn count_rates(&self, from: CurrencyCode, to: CurrencyCode) -> Result<u64, StoreError> {
        let rates = self.rates.read().await;
        Ok(rates
            .iter()
            .filter(|rate| rate.from == from && rate.to == to)
            .count() as u64)
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn insert_student(&self, fields: &StudentFields) -> Result<Student, StoreError> {
        let mut students = self.students.write().await;
        students.next_id += 1;
        let student = to_student(students.next_id, fields);
        students.rows.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update_student(
        &self,
        id: i64,
        fields: &StudentFields,
    ) -> Result<Option<Student>, StoreError> {
        let mut students = self.students.write().await;
        Ok(students.rows.get_mut(&id).map(|row| {
            *row = to_student(id, fields);
            row.clone()
        }))
    }

    async fn delete_student(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.students.write().await.rows.remove(&id).is_some())
    }

    async fn find_student(&self, id: i64) -> Result<Option<Student>, StoreError> {
        Ok(self.students.read().await.rows.get(&id).cloned())
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        Ok(self.students.read().await.rows.values().cloned().collect())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn titles_with_average_rating_below(
        &self,
        threshold: f64,
    ) -> Result<Vec<String>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|item| item.average_rating() < threshold)
            .map(|item| item.title.clone())
            .collect())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn to_student(id: i64, fields: &StudentFields) -> Student {
    Student {
        id,
        first_name: fields.first_name.clone(),
        last_name: fields.last_name.clone(),
        age: fields.age,
        email: fields.email.clone(),
    }
}
