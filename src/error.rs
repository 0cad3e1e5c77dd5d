//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every variant renders as a JSON body with a machine-readable `error` code so clients
//! can branch on it without parsing prose.
//!
//! Unauthorized and rate-limited responses never carry internal detail. Internal errors
//! carry a generic code plus an optional opaque `detail` string for diagnostics.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed or is missing (HTTP 401). Carries the error code.
    Unauthorized(String),
    /// Malformed request (HTTP 400). Carries the error code.
    BadRequest(String),
    /// Authenticated but not allowed (HTTP 403). Carries the error code.
    Forbidden(String),
    /// Requested resource does not exist for this caller (HTTP 404).
    NotFound(String),
    /// Resource already exists (HTTP 409).
    Conflict(String),
    /// The admission controller rejected the request (HTTP 429).
    TooManyRequests,
    /// Unexpected server-side error (HTTP 500). Carries an opaque detail string.
    InternalServerError(String),
    /// Failure reported by the persistent store (HTTP 500).
    /// The detail is logged, never sent to the client.
    DatabaseError(String),
    /// Input validation failed (HTTP 422).
    ValidationError(String),
}

impl AppError {
    /// Machine-readable code placed in the `error` field of the response body.
    pub fn code(&self) -> &str {
        match self {
            AppError::Unauthorized(code)
            | AppError::BadRequest(code)
            | AppError::Forbidden(code)
            | AppError::NotFound(code)
            | AppError::Conflict(code) => code,
            AppError::TooManyRequests => "too_many_requests",
            AppError::InternalServerError(_) => "internal_error",
            AppError::DatabaseError(_) => "database_error",
            AppError::ValidationError(_) => "validation_failed",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::TooManyRequests => write!(f, "Too Many Requests"),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            AppError::TooManyRequests => builder
                .insert_header(("Retry-After", "1"))
                .json(json!({
                    "error": self.code(),
                    "message": "Too many requests"
                })),
            AppError::InternalServerError(detail) => builder.json(json!({
                "error": self.code(),
                "detail": detail
            })),
            AppError::DatabaseError(detail) => {
                log::error!("store failure: {}", detail);
                builder.json(json!({ "error": self.code() }))
            }
            AppError::ValidationError(detail) => builder.json(json!({
                "error": self.code(),
                "detail": detail
            })),
            _ => builder.json(json!({ "error": self.code() })),
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// Unique-constraint violations become `Conflict`; everything else is a store failure.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("user_exists".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Password hashing failures are internal; the detail is the bcrypt message.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> AppError {
        AppError::InternalServerError(format!("identity provider request failed: {}", error))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(error: actix_web::error::BlockingError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// A store call that outlived its deadline is reported like any other store failure.
impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> AppError {
        AppError::DatabaseError("store deadline exceeded".into())
    }
}
