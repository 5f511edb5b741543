//! Centralized error handling for the loan broker
//!
//! `DomainError` is what the rate, offer and market services return. `ApiError`
//! maps it onto HTTP status codes and a JSON error body for the handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the offer lifecycle and rate engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient market data: only {found} banks found, minimum {required} required")]
    InsufficientMarketData { required: usize, found: usize },

    #[error("{field} {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Offer {offer_id} expired at {expires_at}")]
    OfferExpired {
        offer_id: Uuid,
        expires_at: DateTime<Utc>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        DomainError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

/// Result type alias for the core services
pub type DomainResult<T> = Result<T, DomainError>;

/// Failure reported by an audit or notification sink. Callers log it and carry on.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Sink database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Sink payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Domain(err) => match err {
                DomainError::Validation { .. } => "VALIDATION_ERROR",
                DomainError::NotFound { .. } => "NOT_FOUND",
                DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
                DomainError::Unauthorized(_) => "UNAUTHORIZED",
                DomainError::InsufficientMarketData { .. } => "INSUFFICIENT_MARKET_DATA",
                DomainError::OutOfRange { .. } => "OUT_OF_RANGE",
                DomainError::OfferExpired { .. } => "OFFER_EXPIRED",
                DomainError::Conflict(_) => "CONFLICT",
                DomainError::Database(_) => "DATABASE_ERROR",
            },
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => match err {
                DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
                DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
                DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,
                DomainError::InsufficientMarketData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
                DomainError::OfferExpired { .. } => StatusCode::GONE,
                DomainError::Conflict(_) => StatusCode::CONFLICT,
                DomainError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The request field the error refers to, when there is one
    pub fn details(&self) -> Option<String> {
        match self {
            ApiError::Domain(DomainError::Validation { field, .. }) => Some(field.clone()),
            ApiError::Domain(DomainError::OutOfRange { field, .. }) => Some(field.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let details = self.details();

        // Log server errors
        if status.is_server_error() {
            tracing::error!(error = %message, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %message, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
