//! Error handling for the Fire Department Administration Platform
//!
//! Every failure leaves the API as `{ "success": false, "message": ... }` with an
//! optional machine-readable `error` code and, for validation failures, an
//! `errors` array of field messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{Denial, PortalRejection, StockError, TransitionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Authorization errors
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation failed")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(code.to_string()),
            errors: None,
        }
    }
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::ValidationErrors(_)
            | AppError::BadRequest(_)
            | AppError::InsufficientStock(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DatabaseError(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn to_body(&self) -> ErrorResponse {
        match self {
            AppError::InvalidCredentials => {
                ErrorResponse::new("INVALID_CREDENTIALS", "Invalid email or password")
            }
            AppError::TokenExpired => ErrorResponse::new("TOKEN_EXPIRED", "Token has expired"),
            AppError::InvalidToken => ErrorResponse::new("INVALID_TOKEN", "Invalid token"),
            AppError::Unauthorized(msg) => ErrorResponse::new("UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => ErrorResponse::new("FORBIDDEN", msg.clone()),
            AppError::Validation { field, message } => ErrorResponse {
                success: false,
                message: "Validation failed".to_string(),
                error: Some("VALIDATION_ERROR".to_string()),
                errors: Some(vec![FieldError {
                    field: field.clone(),
                    message: message.clone(),
                }]),
            },
            AppError::ValidationErrors(errors) => ErrorResponse {
                success: false,
                message: "Validation failed".to_string(),
                error: Some("VALIDATION_ERROR".to_string()),
                errors: Some(field_errors(errors)),
            },
            AppError::BadRequest(msg) => ErrorResponse::new("BAD_REQUEST", msg.clone()),
            AppError::DuplicateEntry(field) => ErrorResponse::new(
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
            ),
            AppError::Conflict(msg) => ErrorResponse::new("CONFLICT", msg.clone()),
            AppError::NotFound(resource) => {
                ErrorResponse::new("NOT_FOUND", format!("{} not found", resource))
            }
            AppError::InvalidStateTransition(msg) => {
                ErrorResponse::new("INVALID_STATE_TRANSITION", msg.clone())
            }
            AppError::InsufficientStock(msg) => {
                ErrorResponse::new("INSUFFICIENT_STOCK", msg.clone())
            }
            AppError::DatabaseError(e) if is_unique_violation(e) => {
                ErrorResponse::new("DUPLICATE_ENTRY", "A record with these values already exists")
            }
            AppError::DatabaseError(_) => {
                ErrorResponse::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::Internal(_) | AppError::InternalError(_) => {
                ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Flatten validator output into `{field, message}` pairs, sorted by field
fn field_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field)),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        (status, Json(self.to_body())).into_response()
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Forbidden(msg) => AppError::Forbidden(msg.to_string()),
            Denial::BadRequest(msg) => AppError::BadRequest(msg.to_string()),
        }
    }
}

impl From<PortalRejection> for AppError {
    fn from(rejection: PortalRejection) -> Self {
        AppError::Unauthorized(rejection.to_string())
    }
}

impl From<StockError> for AppError {
    fn from(error: StockError) -> Self {
        match error {
            StockError::NonPositiveQuantity | StockError::ZeroAdjustment => {
                AppError::validation("quantity", error.to_string())
            }
            StockError::Insufficient { .. } | StockError::NegativeStock { .. } => {
                AppError::InsufficientStock(error.to_string())
            }
            StockError::Overflow => AppError::BadRequest(error.to_string()),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::NotAllowed { .. } => AppError::InvalidStateTransition(error.to_string()),
            TransitionError::UnknownStatus(_) => AppError::validation("status", error.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ReorderStatus;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3, message = "Name is too short"))]
        name: String,
        #[validate(range(min = 1))]
        quantity: i32,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("User".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidStateTransition("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_denial_mapping() {
        let forbidden: AppError = Denial::Forbidden("nope").into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        let bad: AppError = Denial::BadRequest("self").into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stock_and_transition_mapping() {
        let insufficient: AppError = StockError::Insufficient {
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(insufficient.status(), StatusCode::BAD_REQUEST);

        let transition: AppError = ReorderStatus::Received
            .transition(ReorderStatus::Pending)
            .unwrap_err()
            .into();
        assert_eq!(transition.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_validation_errors_become_field_list() {
        let probe = Probe {
            name: "ab".into(),
            quantity: 0,
        };
        let err = AppError::from(probe.validate().unwrap_err());
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["success"], false);
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["field"], "name");
        assert_eq!(errors[0]["message"], "Name is too short");
        assert_eq!(errors[1]["field"], "quantity");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let body = serde_json::to_value(AppError::Internal("secret detail".into()).to_body()).unwrap();
        assert_eq!(body["message"], "An internal server error occurred");
    }
}
