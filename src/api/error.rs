//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::pipeline::PipelineError;
use crate::storage::StorageError;
use crate::sync::SyncError;
use crate::validation::FieldErrors;
use crate::whatsapp::GatewayError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    /// Per-field messages for `VALIDATION` errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Session expired")]
    SessionExpired,
    #[error("Not allowed")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("WhatsApp gateway is not configured")]
    GatewayNotConfigured,
    #[error("Gateway error: {0}")]
    Gateway(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Single-field validation error.
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "SESSION_EXPIRED",
                "Session expired, sign in again".to_string(),
                None,
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You are not allowed to do this".to_string(),
                None,
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION",
                fields.to_string(),
                Some(fields),
            ),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail, None),
            ApiError::GatewayNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "GATEWAY_NOT_CONFIGURED",
                "Configure the WhatsApp gateway first".to_string(),
                None,
            ),
            ApiError::Gateway(detail) => {
                tracing::warn!(detail, "Gateway call failed");
                (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR", detail, None)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message, fields },
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            DatabaseError::ConstraintViolation(detail) => ApiError::Conflict(detail),
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, detail))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ApiError::Conflict(detail.unwrap_or_else(|| "constraint violated".into()))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => e.into(),
            CoreError::Gateway(e) => e.into(),
            CoreError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidSession => ApiError::Unauthorized,
            AuthError::SessionExpired => ApiError::SessionExpired,
            AuthError::EmailTaken => ApiError::Conflict(err.to_string()),
            AuthError::Validation(fields) => ApiError::Validation(fields),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => ApiError::GatewayNotConfigured,
            GatewayError::InvalidPhone(_) => ApiError::field("phone", "not a WhatsApp number"),
            GatewayError::EmptyMessage => ApiError::field("text", crate::validation::REQUIRED),
            GatewayError::Media(detail) => ApiError::BadRequest(detail),
            GatewayError::Database(e) => e.into(),
            other => ApiError::Gateway(other.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Database(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::UnknownStage(_) => ApiError::field("status", "unknown stage"),
            PipelineError::PatientNotOnBoard(id) => ApiError::NotFound(format!("patient {id} not found")),
            PipelineError::WriteFailed(e) => e.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ApiError::NotFound("file not found".into())
            }
            StorageError::Io(e) => ApiError::Internal(e.to_string()),
            StorageError::InvalidPath(_) => ApiError::NotFound("file not found".into()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
