//! Consistent JSON error responses.
//!
//! Every failure is `{"error": <code>, "message": <text>}`; validation failures
//! add `"issues": [{field, message}]`. Internal details are logged, never
//! returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use stockroom_auth::IdentityError;
use stockroom_core::{DomainError, FieldIssue};
use stockroom_infra::{LedgerError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("request validation failed")]
    Validation(Vec<FieldIssue>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldIssue::new(field, message)])
    }

    /// Name the entity in a not-found error.
    pub fn for_entity(self, entity: &'static str) -> Self {
        match self {
            ApiError::NotFound(_) => ApiError::NotFound(entity),
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientStock { .. } | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::InsufficientStock { .. } => "insufficient_stock",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({
                    "error": "validation_error",
                    "message": "request validation failed",
                    "issues": issues,
                })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
            }
            other => json_error(other.status(), other.code(), other.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(issues) => ApiError::Validation(issues),
            DomainError::InvalidId(msg) => ApiError::validation("id", msg),
            DomainError::InsufficientStock { available, requested } => {
                ApiError::InsufficientStock { available, requested }
            }
            DomainError::NotFound => ApiError::NotFound("resource"),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => e.into(),
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Domain(e) => e.into(),
            LedgerError::Store(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::NotFound => ApiError::NotFound("user"),
            IdentityError::Rejected(msg) => ApiError::Conflict(msg),
            IdentityError::Unavailable(msg) => ApiError::Internal(msg),
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::validation("quantity", "bad"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("ItemId: nope"), StatusCode::BAD_REQUEST),
            (DomainError::NotFound, StatusCode::NOT_FOUND),
            (DomainError::conflict("dup"), StatusCode::CONFLICT),
            (
                DomainError::InsufficientStock { available: 0, requested: 1 },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn insufficient_stock_has_its_own_code() {
        let err = ApiError::from(DomainError::InsufficientStock { available: 2, requested: 5 });
        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(err.to_string(), "insufficient stock: available 2, requested 5");
    }

    #[test]
    fn internal_details_are_not_returned() {
        let resp = ApiError::Internal("password=hunter2".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn entity_label_only_changes_not_found() {
        assert_eq!(ApiError::NotFound("resource").for_entity("item").to_string(), "item not found");
        assert!(matches!(ApiError::Unauthorized.for_entity("item"), ApiError::Unauthorized));
    }
}
