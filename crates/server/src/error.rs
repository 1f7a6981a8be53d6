// HTTP boundary errors
// Decision: One error enum for every handler so status mapping lives in one place
// Decision: Internal errors are logged with their full context chain and answered with an opaque body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Message returned for every 500. Never includes the underlying cause.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// A single invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// Dotted path of the offending field, e.g. `answers[2].quantity`.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

/// Standard error body for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
    /// Field-level details, present on validation errors only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

/// Collects field errors across a request body before failing.
#[derive(Debug, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session. Always 401.
    #[error("{0}")]
    Unauthenticated(String),

    /// Valid session, insufficient privilege. Always 403.
    #[error("{0}")]
    Forbidden(String),

    /// Resource absent. Checked before any ownership comparison.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "Request failed with internal error");
                ErrorResponse {
                    error: INTERNAL_ERROR_MESSAGE.to_string(),
                    fields: Vec::new(),
                }
            }
            ApiError::Validation(fields) => ErrorResponse {
                error: "Validation failed".to_string(),
                fields,
            },
            other => ErrorResponse {
                error: other.to_string(),
                fields: Vec::new(),
            },
        };
        (status, Json(body)).into_response()
    }
}
