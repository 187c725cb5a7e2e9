//! Error taxonomy shared by the core and the HTTP boundary.
//!
//! Every domain failure is a [`ServiceError`]. The gateway converts it into a
//! status code and a JSON body; internal and storage failures are logged in
//! full and returned to the caller with a redacted message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::store::StoreError;

/// One failing input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Why a bearer token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// No `Authorization: Bearer` credential on the request.
    Missing,
    /// A token was presented but is malformed, forged or expired.
    Invalid,
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => f.write_str("missing bearer token"),
            Self::Invalid => f.write_str("invalid or expired token"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid password")]
    InvalidCredential,

    #[error("{0}")]
    Unauthenticated(TokenRejection),

    #[error("{0}")]
    Forbidden(String),

    #[error("collection is busy, retry later")]
    Busy,

    #[error("storage unavailable")]
    StorageUnavailable(#[source] StoreError),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::Unauthenticated(TokenRejection::Missing) => StatusCode::UNAUTHORIZED,
            Self::Unauthenticated(TokenRejection::Invalid) => StatusCode::FORBIDDEN,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Busy | Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy { .. } => Self::Busy,
            other => Self::StorageUnavailable(other),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => serde_json::json!({
                "error": self.to_string(),
                "errors": errors,
            }),
            Self::StorageUnavailable(source) => {
                tracing::error!(error = %source, "Collection storage failure");
                serde_json::json!({"error": self.to_string()})
            }
            Self::Internal(source) => {
                tracing::error!(error = format!("{source:#}"), "Unhandled request failure");
                serde_json::json!({"error": self.to_string()})
            }
            _ => serde_json::json!({"error": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_rejections_map_to_401_and_403() {
        assert_eq!(
            ServiceError::Unauthenticated(TokenRejection::Missing).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Unauthenticated(TokenRejection::Invalid).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_busy_becomes_busy() {
        let err: ServiceError = StoreError::Busy {
            location: "users.json".into(),
            waited: Duration::from_millis(5),
        }
        .into();
        assert!(matches!(err, ServiceError::Busy));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_message_is_redacted() {
        let err = ServiceError::Internal(anyhow::anyhow!("disk path /secret/x exploded"));
        assert_eq!(err.to_string(), "internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
