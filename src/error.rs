use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::Utc;
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::currency::{CurrencyCode, InvalidCurrencyCode};
use crate::rate_cache::LookupError;
use crate::source::SourceError;
use crate::store::StoreError;
use crate::student::{StudentError, ValidationErrors};

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// JSON body shared by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Student with id {0} not found")]
    StudentNotFound(i64),
    #[error("No exchange rate found for {from} -> {to}")]
    RateNotFound { from: CurrencyCode, to: CurrencyCode },
    #[error("The submitted data is not valid")]
    Validation(ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Only a pair the source does not know reads as "not found"; an unreachable
    /// or misbehaving source is an internal error.
    pub fn rate_lookup(from: CurrencyCode, to: CurrencyCode, err: LookupError) -> Self {
        match err {
            LookupError::Source(SourceError::NoRate { .. }) => Self::RateNotFound { from, to },
            LookupError::Source(err) => Self::Internal(err.to_string()),
            LookupError::Store(err) => err.into(),
        }
    }
}

impl From<StudentError> for AppError {
    fn from(err: StudentError) -> Self {
        match err {
            StudentError::NotFound(id) => Self::StudentNotFound(id),
            StudentError::Validation(errors) => Self::Validation(errors),
            StudentError::Store(err) => err.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<InvalidCurrencyCode> for AppError {
    fn from(err: InvalidCurrencyCode) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::StudentNotFound(_) | Self::RateNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error, message, details) = match self {
            Self::Validation(errors) => (
                "Validation Failed".to_string(),
                self.to_string(),
                errors.fields().clone(),
            ),
            Self::Internal(detail) => {
                error!("Unexpected error: {}", detail);
                (
                    reason(status),
                    INTERNAL_MESSAGE.to_string(),
                    BTreeMap::new(),
                )
            }
            _ => (reason(status), self.to_string(), BTreeMap::new()),
        };

        HttpResponse::build(status).json(ErrorResponse {
            timestamp: Utc::now().to_rfc3339(),
            status: status.as_u16(),
            error,
            message,
            details,
        })
    }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Error").to_string()
}
