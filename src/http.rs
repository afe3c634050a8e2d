//! actix-web routes for rates, students, item titles and health.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header::CACHE_CONTROL;
use actix_web::{HttpResponse, web};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyCode;
use crate::error::AppError;
use crate::item::ItemService;
use crate::rate_cache::{MissPolicy, RateCache};
use crate::source::RateSource;
use crate::store::{ItemStore, RateStore, StoreHealth, StudentStore};
use crate::student::{StudentRequest, StudentService};

/// Shared handler state; every collaborator is passed in explicitly.
pub struct AppState {
    pub rates: Arc<RateCache>,
    pub students: StudentService,
    pub items: ItemService,
    pub health: Arc<dyn StoreHealth>,
    pub stream_delay: Duration,
}

impl AppState {
    /// Wires every service to one backing store.
    pub fn new<S>(
        store: Arc<S>,
        source: Arc<dyn RateSource>,
        miss_policy: MissPolicy,
        stream_delay: Duration,
    ) -> Self
    where
        S: RateStore + StudentStore + ItemStore + StoreHealth + 'static,
    {
        Self {
            rates: Arc::new(RateCache::new(store.clone(), source, miss_policy)),
            students: StudentService::new(store.clone()),
            items: ItemService::new(store.clone()),
            health: store,
            stream_delay,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RateResponse {
    pub rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct TitlesQuery {
    pub rating: f64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::bad_request(err.to_string()).into()),
    )
    .route("/health", web::get().to(health))
    .route("/rate/{from}/{to}", web::get().to(get_rate))
    .route("/titles", web::get().to(titles))
    .service(
        web::scope("/students")
            .route("", web::post().to(create_student))
            .route("", web::get().to(list_students))
            .route("/stream", web::get().to(stream_students))
            .route("/{id}", web::get().to(get_student))
            .route("/{id}", web::put().to(update_student))
            .route("/{id}", web::delete().to(delete_student)),
    );
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.health.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })),
        Err(err) => {
            warn!("Health check failed: {}", err);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({ "status": "unavailable" }))
        }
    }
}

async fn get_rate(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (from, to) = path.into_inner();
    let from: CurrencyCode = from.parse()?;
    let to: CurrencyCode = to.parse()?;
    info!("From: {}, To: {}", from, to);

    let rate = state
        .rates
        .get_rate(from, to)
        .await
        .map_err(|err| AppError::rate_lookup(from, to, err))?;

    Ok(HttpResponse::Ok().json(RateResponse { rate }))
}

async fn titles(
    state: web::Data<AppState>,
    query: web::Query<TitlesQuery>,
) -> Result<HttpResponse, AppError> {
    if !query.rating.is_finite() {
        return Err(AppError::bad_request("rating must be a finite number"));
    }

    let titles = state
        .items
        .titles_with_average_rating_below(query.rating)
        .await?;
    Ok(HttpResponse::Ok().json(titles))
}

async fn create_student(
    state: web::Data<AppState>,
    body: web::Json<StudentRequest>,
) -> Result<HttpResponse, AppError> {
    let student = state.students.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(student))
}

async fn update_student(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<StudentRequest>,
) -> Result<HttpResponse, AppError> {
    let student = state
        .students
        .update(id.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(student))
}

async fn delete_student(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.students.delete(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn get_student(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let student = state.students.find_by_id(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(student))
}

async fn list_students(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let students = state.students.find_all().await?;
    Ok(HttpResponse::Ok().json(students))
}

/// Server-sent events, one student per event, each preceded by the configured delay.
async fn stream_students(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let students = state.students.find_all().await?;
    let delay = state.stream_delay;

    let events = async_stream::stream! {
        for student in students {
            tokio::time::sleep(delay).await;
            match serde_json::to_string(&student) {
                Ok(json) => yield Ok::<_, Infallible>(web::Bytes::from(format!("data:{json}\n\n"))),
                Err(err) => {
                    error!("Failed to encode student {}: {}", student.id, err);
                    break;
                }
            }
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(events))
}
