use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::mac::MacError;
use crate::radius::SyncError;

/// Errors returned by API handlers, rendered as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    InvalidMac(#[from] MacError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The RADIUS rewrite failed and the whole mutation was rolled back
    #[error("RADIUS policy could not be updated, no changes were saved")]
    PolicySync(#[source] anyhow::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    /// Log the real cause and hide it behind a generic message
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", context, err);
        AppError::Internal(context.to_string())
    }

    /// Map a storage error, turning unique-constraint hits into `Conflict`
    pub fn from_db(err: anyhow::Error, conflict_msg: &str, context: &str) -> Self {
        if is_unique_violation(&err) {
            AppError::conflict(conflict_msg)
        } else {
            AppError::internal(context, err)
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidMac(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PolicySync(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            // Operator input, not a system failure
            SyncError::InvalidSsidPattern(msg) => AppError::BadRequest(format!("Invalid SSID pattern: {}", msg)),
            SyncError::Storage(e) => {
                tracing::error!("RADIUS policy sync failed: {:#}", e);
                AppError::PolicySync(e)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub type ApiResult<T> = Result<T, AppError>;
