use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::engine::GameError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business-rule rejection from the engine.
    #[error(transparent)]
    Game(#[from] GameError),
    /// Storage backend failed.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest {
            code: "ValidationFailed",
            message: format!("validation failed: {}", err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::BadRequest {
            code: "InvalidJson",
            message: err.body_text(),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input or a failed precondition.
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    /// Unauthorized access attempt.
    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },
    /// Requested resource not found.
    #[error("{message}")]
    NotFound { code: &'static str, message: String },
    /// Resource existed but is no longer available.
    #[error("{message}")]
    Gone { code: &'static str, message: String },
    /// Conflict with current state.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    /// Service unavailable or degraded.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Symbolic error code exposed in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Gone { code, .. }
            | AppError::Conflict { code, .. } => code,
            AppError::ServiceUnavailable(_) => "StorageUnavailable",
            AppError::Internal(_) => "Internal",
        }
    }

    /// HTTP status returned for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Gone { .. } => StatusCode::GONE,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            GameError::NoActiveGame | GameError::PlayerNotFound(_) | GameError::RoundNotFound(_) => {
                AppError::NotFound { code, message }
            }
            GameError::GameExpired => AppError::Gone { code, message },
            GameError::InvalidCode => AppError::Unauthorized { code, message },
            GameError::AdminAlreadyConnected => AppError::Conflict { code, message },
            GameError::InvalidInput(_)
            | GameError::GameAlreadyStarted
            | GameError::WrongMode { .. }
            | GameError::GameNotStarted
            | GameError::AllRoundsDone
            | GameError::RoundNotActive
            | GameError::NotCurrentRound { .. }
            | GameError::NoMoreHints(_) => AppError::BadRequest { code, message },
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Game(game) => game.into(),
            ServiceError::Unavailable(StorageError::Corrupt { document, message }) => {
                AppError::Internal(format!("stored {document} document is corrupt: {message}"))
            }
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => {
                AppError::ServiceUnavailable("storage unavailable (degraded mode)".into())
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized {
                code: "Unauthorized",
                message,
            },
            ServiceError::InvalidInput(message) => AppError::BadRequest {
                code: "InvalidInput",
                message,
            },
        }
    }
}

/// Error payload returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Symbolic error code, e.g. `GameExpired`.
    pub error: String,
    /// Human readable explanation.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        });

        (self.status(), payload).into_response()
    }
}
