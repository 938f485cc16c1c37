use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Errors raised at the HTTP boundary. Each variant maps to exactly one status code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid fields: {invalid}. Allowed: {allowed}")]
    InvalidField { invalid: String, allowed: String },

    #[error("Invalid include values: {invalid}. Allowed: {allowed}")]
    InvalidInclude { invalid: String, allowed: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: i32) -> Self {
        AppError::NotFound(format!("{entity} with id {id} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidField { .. } | AppError::InvalidInclude { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Queue(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Turns a unique-constraint violation into a `Conflict`, leaving other errors as-is.
    pub fn from_write(err: DbErr, conflict_message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(conflict_message.into()),
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
            tracing::Span::current().record("error", message.as_str());
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
