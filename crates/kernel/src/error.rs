//! Engine error taxonomy.
//!
//! Every engine operation returns a typed error; nothing is silently
//! swallowed. The HTTP layer maps each kind to a stable status code:
//! not-found -> 404, malformed input and validation failures -> 422,
//! everything internal -> 500.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Aggregate of per-field validation failures.
///
/// Field order is stable (BTreeMap) so error payloads are deterministic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Record a failure message for a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Merge another set of failures into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed filter: {0}")]
    MalformedFilter(String),

    #[error("malformed sort: {0}")]
    MalformedSort(String),

    #[error("malformed pagination: {0}")]
    MalformedPagination(String),

    #[error("field not found [{0}]")]
    UnknownField(String),

    #[error("field [{field}] is not a relation type field")]
    InvalidOperatorForType { field: String },

    #[error("invalid value for field [{field}]: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("record not found")]
    NotFound,

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::MalformedFilter(_)
            | EngineError::MalformedSort(_)
            | EngineError::MalformedPagination(_)
            | EngineError::UnknownField(_)
            | EngineError::InvalidOperatorForType { .. }
            | EngineError::InvalidValue { .. }
            | EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Database(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        match self {
            // Validation failures carry the full per-field breakdown.
            EngineError::Validation(errors) => (status, Json(errors)).into_response(),
            // Internal details are logged, never leaked to the caller.
            EngineError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    status,
                    Json(ErrorBody {
                        error: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
            EngineError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                (
                    status,
                    Json(ErrorBody {
                        error: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
            other => (
                status,
                Json(ErrorBody {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_accumulate_in_field_order() {
        let mut errors = ValidationErrors::default();
        errors.add("title", "The title field is required.");
        errors.add("email", "The email must be a valid email address.");
        errors.add("title", "The title must be at least 3 characters.");

        let json = serde_json::to_string(&errors).unwrap();
        // BTreeMap: email serializes before title regardless of insertion order
        assert!(json.find("email").unwrap() < json.find("title").unwrap());
        assert_eq!(errors.errors["title"].len(), 2);
    }

    #[test]
    fn merge_combines_field_messages() {
        let mut a = ValidationErrors::default();
        a.add("name", "The name field is required.");

        let mut b = ValidationErrors::default();
        b.add("name", "The name has already been taken.");
        b.add("price", "The price must be numeric.");

        a.merge(b);
        assert_eq!(a.errors["name"].len(), 2);
        assert_eq!(a.errors["price"].len(), 1);
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            EngineError::UnknownField("price".to_string()).to_string(),
            "field not found [price]"
        );
        assert_eq!(EngineError::NotFound.to_string(), "record not found");
    }
}
