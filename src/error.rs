use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    dto::validation::validation_kind,
    state::{game::InvalidEntity, transitions::TransitionError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed for a reason other than a version conflict.
    #[error("storage failure")]
    Storage(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("{message}")]
    InvalidInput { kind: &'static str, message: String },
    /// The request carried no concurrency token.
    #[error("missing concurrency token (send `If-Match` or `etag`)")]
    MissingToken,
    /// Every write attempt hit a version conflict.
    #[error("game state was modified concurrently ({attempts} attempts)")]
    Conflict { attempts: u32 },
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::InvalidInput {
            kind: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput {
            kind: validation_kind(&err),
            message: format!("validation failed: {err}"),
        }
    }
}

impl ServiceError {
    /// Wrap a stored document that no longer satisfies the game invariants.
    pub fn invalid_document(key: &str, err: InvalidEntity) -> Self {
        ServiceError::Storage(StorageError::InvalidDocument {
            key: key.to_string(),
            message: err.to_string(),
        })
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{message}")]
    BadRequest { kind: &'static str, message: String },
    /// Conflict with a concurrent writer.
    #[error("{0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(kind: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            kind,
            message: message.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest { kind, .. } => *kind,
            AppError::Conflict(_) => "conflict",
            AppError::ServiceUnavailable(_) => "unavailable",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => {
                error!(error = %source, "storage operation failed");
                // Only the error class leaves the process, never backend details.
                let message = match source {
                    StorageError::InvalidDocument { .. } => "stored game state is invalid",
                    StorageError::NotFound { .. } => "game state disappeared",
                    StorageError::VersionConflict { .. } | StorageError::Unavailable { .. } => {
                        "storage request failed"
                    }
                };
                AppError::Internal(message.into())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput { kind, message } => AppError::BadRequest { kind, message },
            err @ ServiceError::MissingToken => AppError::bad_request("missing_etag", err.to_string()),
            err @ ServiceError::Conflict { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Short machine-readable error tag.
    pub error: String,
    /// Human readable description.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
