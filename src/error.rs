use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::models::InvitationStatus;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

pub type BoardResult<T> = Result<T, BoardError>;

/// Per-field validation messages keyed by input field name.
pub type FieldErrors = BTreeMap<String, String>;

/// Failure taxonomy of the board core. Validation and containment failures
/// are always raised before any write.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    ContainmentViolation(String),
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },
    #[error("invitation is {status}")]
    InvitationClosed { status: InvitationStatus },
    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),
}

impl BoardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field.to_string(), message.clone());
        Self::Validation {
            message,
            field_errors,
        }
    }

    pub fn containment(message: impl Into<String>) -> Self {
        Self::ContainmentViolation(message.into())
    }
}

impl From<StoreError> for BoardError {
    fn from(value: StoreError) -> Self {
        BoardError::StoreUnavailable(value.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    field_errors: FieldErrors,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            field_errors: self.field_errors,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    field_errors: FieldErrors,
}

impl From<BoardError> for AppError {
    fn from(value: BoardError) -> Self {
        let status = match &value {
            BoardError::NotFound(_) => StatusCode::NOT_FOUND,
            BoardError::Unauthorized => StatusCode::FORBIDDEN,
            BoardError::ContainmentViolation(_) => StatusCode::CONFLICT,
            BoardError::Validation { .. } => StatusCode::BAD_REQUEST,
            BoardError::InvitationClosed { .. } => StatusCode::GONE,
            BoardError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let message = value.to_string();
        match value {
            BoardError::Validation { field_errors, .. } => AppError {
                status,
                message,
                field_errors,
            },
            _ => AppError::new(status, message),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        BoardError::from(value).into()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_board_errors_to_statuses() {
        assert_eq!(
            AppError::from(BoardError::Unauthorized).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(BoardError::containment("list belongs to another board")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(BoardError::InvitationClosed {
                status: InvitationStatus::Expired
            })
            .status(),
            StatusCode::GONE
        );
    }

    #[test]
    fn validation_keeps_field_errors() {
        let err = AppError::from(BoardError::invalid_field("title", "title is too short"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.field_errors.get("title").map(String::as_str),
            Some("title is too short")
        );
    }
}
