// Application error taxonomy
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::backtrace::Backtrace;

use crate::middleware::response::{ApiEnvelope, ErrorBody, FieldError};

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// HTTP API error with a stable code, client-safe message and status
#[derive(Debug)]
pub enum AppError {
    // 400 Bad Request
    BadRequest(String),
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    // 401 Unauthorized
    Unauthorized(String),
    InvalidCredentials,
    TokenExpired,

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
    UserNotFound,

    // 409 Conflict
    Conflict(String),
    UsernameExists,
    EmailExists,

    // 429 Too Many Requests
    TooManyRequests,

    // 500 Internal Server Error; the source is logged, never sent
    Internal {
        source: anyhow::Error,
        backtrace: Box<Backtrace>,
    },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidCredentials | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::UsernameExists | AppError::EmailExists => {
                StatusCode::CONFLICT
            }
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::UsernameExists => "USERNAME_EXISTS",
            AppError::EmailExists => "EMAIL_EXISTS",
            AppError::TooManyRequests => "TOO_MANY_REQUESTS",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg,
            AppError::Validation { message, .. } => message,
            AppError::InvalidCredentials => "Invalid username or password",
            AppError::TokenExpired => "Token has expired",
            AppError::UserNotFound => "User not found",
            AppError::UsernameExists => "Username already exists",
            AppError::EmailExists => "Email already exists",
            AppError::TooManyRequests => "Too many requests, please try again later",
            AppError::Internal { .. } => INTERNAL_MESSAGE,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let fields = match self {
            AppError::Validation { fields, .. } if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        };
        ErrorBody {
            code: self.error_code().to_string(),
            message: self.message().to_string(),
            fields,
        }
    }
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        AppError::Validation {
            message: message.into(),
            fields,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    /// Captures the backtrace here, where the failure is first turned into an
    /// `AppError`, not where the response is built.
    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        AppError::Internal {
            source: source.into(),
            backtrace: Box::new(Backtrace::force_capture()),
        }
    }
}

/// Attached to error responses so the logging middleware can report what
/// the client never sees.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub code: &'static str,
    pub detail: String,
    pub backtrace: Option<String>,
}

// Convert module errors to AppError
impl From<crate::database::StoreError> for AppError {
    fn from(err: crate::database::StoreError) -> Self {
        use crate::database::StoreError;
        match err {
            StoreError::NotFound => AppError::UserNotFound,
            StoreError::UsernameTaken => AppError::UsernameExists,
            StoreError::EmailTaken => AppError::EmailExists,
            StoreError::Duplicate(constraint) => {
                tracing::debug!(constraint = %constraint, "unique constraint violated");
                AppError::conflict("Resource already exists")
            }
            StoreError::InvalidFilter(e) => AppError::bad_request(e.to_string()),
            StoreError::Database(e) => AppError::internal(e),
        }
    }
}

impl From<crate::filter::FilterError> for AppError {
    fn from(err: crate::filter::FilterError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

impl From<crate::auth::TokenError> for AppError {
    fn from(err: crate::auth::TokenError) -> Self {
        use crate::auth::TokenError;
        match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid(_) => AppError::unauthorized("Invalid token"),
            TokenError::Signing(e) => AppError::internal(e),
        }
    }
}

impl From<crate::auth::password::PasswordError> for AppError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        AppError::internal(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Internal { source, .. } => write!(f, "{}: {:#}", INTERNAL_MESSAGE, source),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiEnvelope::<()>::failure(self.to_body());

        let report = ErrorReport {
            code: self.error_code(),
            detail: self.to_string(),
            backtrace: match &self {
                AppError::Internal { backtrace, .. } => Some(backtrace.to_string()),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Body used when a handler panics and the panic is caught.
pub fn panic_response_body() -> impl Serialize {
    ApiEnvelope::<()>::failure(ErrorBody {
        code: "INTERNAL_ERROR".to_string(),
        message: INTERNAL_MESSAGE.to_string(),
        fields: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreError;

    #[test]
    fn store_errors_map_to_taxonomy() {
        assert_eq!(AppError::from(StoreError::NotFound).error_code(), "USER_NOT_FOUND");
        assert_eq!(AppError::from(StoreError::UsernameTaken).error_code(), "USERNAME_EXISTS");
        assert_eq!(AppError::from(StoreError::EmailTaken).error_code(), "EMAIL_EXISTS");
        assert_eq!(
            AppError::from(StoreError::Duplicate("users_pkey".into())).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn internal_errors_hide_their_source() {
        let err = AppError::internal(anyhow::anyhow!("connection refused on 10.0.0.5"));
        let body = err.to_body();

        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.message, INTERNAL_MESSAGE);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn validation_fields_only_rendered_when_present() {
        let empty = AppError::validation("Invalid data", vec![]);
        assert!(empty.to_body().fields.is_none());

        let with_fields = AppError::validation(
            "Invalid data",
            vec![FieldError::new("email", "must be a valid email address")],
        );
        let fields = with_fields.to_body().fields.unwrap();
        assert_eq!(fields[0].field, "email");
    }

    #[test]
    fn server_errors_carry_backtrace_report() {
        let response = AppError::internal(anyhow::anyhow!("boom")).into_response();
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert!(report.backtrace.is_some());

        let response = AppError::InvalidCredentials.into_response();
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.code, "INVALID_CREDENTIALS");
        assert!(report.backtrace.is_none());
    }

    #[inline(never)]
    fn failing_lookup() -> Result<(), AppError> {
        Err(AppError::internal(anyhow::anyhow!("connection reset")))
    }

    #[test]
    fn backtrace_points_at_the_failure_site() {
        let err = failing_lookup().unwrap_err();
        let response = err.into_response();
        let report = response.extensions().get::<ErrorReport>().unwrap();
        let backtrace = report.backtrace.as_deref().unwrap();
        assert!(backtrace.contains("failing_lookup"));
    }
}
