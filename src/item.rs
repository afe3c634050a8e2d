use std::sync::Arc;

use crate::store::{ItemStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Review {
    pub rating: i32,
}

impl Item {
    /// Arithmetic mean of review ratings; an unreviewed item rates 0.
    pub fn average_rating(&self) -> f64 {
        if self.reviews.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.reviews.iter().map(|review| f64::from(review.rating)).sum();
        sum / self.reviews.len() as f64
    }
}

#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn ItemStore>,
}

impl ItemService {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub async fn titles_with_average_rating_below(
        &self,
        rating: f64,
    ) -> Result<Vec<String>, StoreError> {
        self.store.titles_with_average_rating_below(rating).await
    }
}
