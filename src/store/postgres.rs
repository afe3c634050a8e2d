use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{ItemStore, RateStore, StoreError, StoreHealth, StudentStore};
use crate::currency::CurrencyCode;
use crate::exchange_rate::ExchangeRate;
use crate::student::{Student, StudentFields};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ExchangeRateRow {
    id: Uuid,
    from_currency: String,
    to_currency: String,
    rate: f64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExchangeRateRow> for ExchangeRate {
    type Error = StoreError;

    fn try_from(row: ExchangeRateRow) -> Result<Self, Self::Error> {
        let code = |value: &str| {
            value
                .parse::<CurrencyCode>()
                .map_err(|err| StoreError::Corrupt(format!("exchange rate {}: {err}", row.id)))
        };

        Ok(Self {
            id: row.id,
            from: code(&row.from_currency)?,
            to: code(&row.to_currency)?,
            rate: row.rate,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: i64,
    first_name: String,
    last_name: String,
    age: i32,
    email: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            age: row.age,
            email: row.email,
        }
    }
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RateStore for PostgresStore {
    async fn find_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<ExchangeRate>, StoreError> {
        let row = sqlx::query_as::<_, ExchangeRateRow>(
            r#"
            SELECT id, from_currency, to_currency, rate, updated_at
            FROM exchange_rates
            WHERE from_currency = $1 AND to_currency = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ExchangeRate::try_from).transpose()
    }

    async fn insert_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO exchange_rates (id, from_currency, to_currency, rate, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(rate.id)
        .bind(rate.from.as_str())
        .bind(rate.to.as_str())
        .bind(rate.rate)
        .bind(rate.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_rates(&self, from: CurrencyCode, to: CurrencyCode) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM exchange_rates WHERE from_currency = $1 AND to_currency = $2",
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl StudentStore for PostgresStore {
    async fn insert_student(&self, fields: &StudentFields) -> Result<Student, StoreError> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            INSERT INTO students (first_name, last_name, age, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, first_name, last_name, age, email
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.age)
        .bind(&fields.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_student(
        &self,
        id: i64,
        fields: &StudentFields,
    ) -> Result<Option<Student>, StoreError> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            UPDATE students
            SET first_name = $2, last_name = $3, age = $4, email = $5
            WHERE id = $1
            RETURNING id, first_name, last_name, age, email
            "#,
        )
        .bind(id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.age)
        .bind(&fields.email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Student::from))
    }

    async fn delete_student(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_student(&self, id: i64) -> Result<Option<Student>, StoreError> {
        let row = sqlx::query_as::<_, StudentRow>(
            "SELECT id, first_name, last_name, age, email FROM students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Student::from))
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let rows = sqlx::query_as::<_, StudentRow>(
            "SELECT id, first_name, last_name, age, email FROM students ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Student::from).collect())
    }
}

#[async_trait]
impl ItemStore for PostgresStore {
    async fn titles_with_average_rating_below(
        &self,
        threshold: f64,
    ) -> Result<Vec<String>, StoreError> {
        let titles = sqlx::query_scalar::<_, String>(
            r#"
            SELECT i.title
            FROM items i
            LEFT JOIN reviews r ON r.item_id = i.id
            GROUP BY i.id, i.title
            HAVING COALESCE(AVG(r.rating)::DOUBLE PRECISION, 0) < $1
            ORDER BY i.id
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }
}

#[async_trait]
impl StoreHealth for PostgresStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
