use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthError(e) => e.code(),
            AppError::ValidationError(_) => "VALIDATION_FAILED",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::DatabaseError(DatabaseError::NotFound) => "NOT_FOUND",
            AppError::DatabaseError(DatabaseError::Duplicate) => "CONFLICT",
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }

    /// Message safe to show to a client. Server-side failures never expose their detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::UserNotFound => "User not found".to_string(),
            AppError::DatabaseError(DatabaseError::NotFound) => "Record not found".to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate) => "Record already exists".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Prefixes infrastructure failures with `ctx`. Domain errors pass through unchanged.
    pub fn context(self, ctx: &str) -> Self {
        match self {
            AppError::DatabaseError(DatabaseError::ConnectionError(msg)) => {
                AppError::DatabaseError(DatabaseError::ConnectionError(format!("{}: {}", ctx, msg)))
            }
            AppError::DatabaseError(DatabaseError::QueryError(msg)) => {
                AppError::DatabaseError(DatabaseError::QueryError(format!("{}: {}", ctx, msg)))
            }
            AppError::InternalError(msg) => AppError::InternalError(format!("{}: {}", ctx, msg)),
            other => other,
        }
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::DatabaseError(DatabaseError::NotFound),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DatabaseError(DatabaseError::Duplicate)
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DatabaseError(DatabaseError::ConnectionError(err.to_string()))
            }
            _ => AppError::DatabaseError(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::QueryError(format!("migration failed: {}", err)))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::AuthError(AuthError::InvalidToken)
    }
}

impl From<rand::Error> for AppError {
    fn from(err: rand::Error) -> Self {
        AppError::InternalError(format!("random source failure: {}", err))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        }
        let response = json!({
            "success": false,
            "error": {
                "status": status.as_u16(),
                "code": self.code(),
                "message": self.public_message()
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidOtp => StatusCode::UNAUTHORIZED,
                AuthError::OtpExpired => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Too many requests. Please try again later")]
    RateLimited,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidOtp => "INVALID_OTP",
            AuthError::OtpExpired => "OTP_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::RateLimited => "RATE_LIMIT_EXCEEDED",
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        // Test IO error conversion
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        // Test config error conversion
        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        // Test database error conversion
        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::NotFound)));

        let db_err = sqlx::Error::PoolTimedOut;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::ConnectionError(_))));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::AuthError(AuthError::InvalidOtp);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::OtpExpired);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::RateLimited);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::ValidationError("invalid input".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::UserNotFound;
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::InternalError("boom".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AppError::AuthError(AuthError::InvalidOtp).code(), "INVALID_OTP");
        assert_eq!(AppError::AuthError(AuthError::OtpExpired).code(), "OTP_EXPIRED");
        assert_eq!(AppError::AuthError(AuthError::RateLimited).code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(AppError::AuthError(AuthError::InvalidToken).code(), "INVALID_TOKEN");
        assert_eq!(AppError::ValidationError("x".into()).code(), "VALIDATION_FAILED");
        assert_eq!(AppError::UserNotFound.code(), "USER_NOT_FOUND");
        assert_eq!(
            AppError::DatabaseError(DatabaseError::QueryError("x".into())).code(),
            "INTERNAL_SERVER_ERROR"
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = AppError::DatabaseError(DatabaseError::QueryError(
            "relation \"users\" does not exist".to_string(),
        ));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::InternalError("random source failure".to_string());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_context_only_wraps_infrastructure_errors() {
        let err = AppError::InternalError("entropy".into()).context("generating OTP");
        assert_eq!(err.to_string(), "Internal server error: generating OTP: entropy");

        let err = AppError::AuthError(AuthError::InvalidOtp).context("verifying OTP");
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidOtp)));
    }

    #[test]
    fn test_error_display() {
        let err = AppError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");

        let err = AppError::AuthError(AuthError::InvalidOtp);
        assert_eq!(err.to_string(), "Authentication error: Invalid or expired OTP");

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.to_string(), "Database error: Record not found");
    }
}
