//! Postgres store tests. They need a reachable `DATABASE_URL`; run with `cargo test -- --ignored`.

use chrono::Duration;
use sqlx::PgPool;

use valut::currency::CurrencyCode;
use valut::exchange_rate::ExchangeRate;
use valut::store::{ItemStore, PostgresStore, RateStore, StoreHealth, StudentStore};
use valut::student::StudentFields;

fn code(s: &str) -> CurrencyCode {
    s.parse().unwrap()
}

fn juan() -> StudentFields {
    StudentFields {
        first_name: "Juan".to_string(),
        last_name: "Perez".to_string(),
        age: 25,
        email: "juan.perez@email.com".to_string(),
    }
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn rates_append_and_newest_wins(pool: PgPool) {
    let store = PostgresStore::new(pool);
    let (usd, eur) = (code("USD"), code("EUR"));

    let mut older = ExchangeRate::new(usd, eur, 0.90);
    older.updated_at -= Duration::minutes(10);
    let newer = ExchangeRate::new(usd, eur, 0.92);

    store.insert_rate(&older).await.expect("insert older rate");
    store.insert_rate(&newer).await.expect("insert newer rate");

    let found = store
        .find_rate(usd, eur)
        .await
        .expect("find rate")
        .expect("rate exists");
    assert_eq!(found.id, newer.id);
    assert_eq!(found.rate, 0.92);
    assert_eq!(store.count_rates(usd, eur).await.expect("count rates"), 2);
    assert!(store.find_rate(eur, usd).await.expect("find reverse").is_none());
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn student_lifecycle(pool: PgPool) {
    let store = PostgresStore::new(pool);

    let created = store.insert_student(&juan()).await.expect("insert student");
    assert_eq!(
        store.find_student(created.id).await.expect("find student"),
        Some(created.clone())
    );

    let changed = StudentFields { age: 26, ..juan() };
    let updated = store
        .update_student(created.id, &changed)
        .await
        .expect("update student")
        .expect("student exists");
    assert_eq!(updated.age, 26);

    assert!(
        store
            .update_student(created.id + 1000, &changed)
            .await
            .expect("update missing student")
            .is_none()
    );
    assert_eq!(store.list_students().await.expect("list students").len(), 1);

    assert!(store.delete_student(created.id).await.expect("delete student"));
    assert!(!store.delete_student(created.id).await.expect("delete again"));
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn titles_use_zero_for_unreviewed_items(pool: PgPool) {
    sqlx::query("INSERT INTO items (id, title) VALUES (1, 'Unrated'), (2, 'Poor'), (3, 'Great')")
        .execute(&pool)
        .await
        .expect("seed items");
    sqlx::query("INSERT INTO reviews (item_id, rating) VALUES (2, 1), (2, 2), (3, 5), (3, 4)")
        .execute(&pool)
        .await
        .expect("seed reviews");

    let store = PostgresStore::new(pool);
    store.ping().await.expect("ping");

    let titles = store
        .titles_with_average_rating_below(3.0)
        .await
        .expect("query titles");
    assert_eq!(titles, vec!["Unrated".to_string(), "Poor".to_string()]);
}
