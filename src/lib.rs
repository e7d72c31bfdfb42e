pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod users;
pub mod validation;

use actix_web::{error::InternalError, web, HttpResponse};
use chrono::Duration;
use std::sync::Arc;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use audit::{AuditSink, MemoryAuditSink, TracingAuditSink};
pub use auth::{AuthenticatedUser, OtpPolicy, OtpService, RateLimitConfig, RateLimiter, TokenIssuer};
pub use db::{CredentialStore, MemoryStore, PgStore, User};
pub use users::UserService;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn version_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub otp_service: Arc<OtpService>,
    pub user_service: Arc<UserService>,
    pub token_issuer: Arc<TokenIssuer>,
}

impl AppState {
    /// Wires the services over any store implementing every storage capability.
    pub fn with_store<S>(config: Settings, store: Arc<S>, audit: Arc<dyn AuditSink>) -> Self
    where
        S: CredentialStore + 'static,
    {
        let policy = OtpPolicy::from(&config.otp);
        let token_issuer = TokenIssuer::new(
            config.auth.jwt_secret.clone(),
            Duration::hours(config.auth.token_expiry_hours),
        );

        Self {
            otp_service: Arc::new(OtpService::from_store(store.clone(), audit, policy)),
            user_service: Arc::new(UserService::new(store)),
            token_issuer: Arc::new(token_issuer),
            config: Arc::new(config),
        }
    }
}

fn bad_request(err: impl std::fmt::Display, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected malformed request");
    InternalError::from_response(
        err.to_string(),
        actix_web::ResponseError::error_response(&AppError::ValidationError(err.to_string())),
    )
    .into()
}

/// Registers every route. Extractor failures answer with the standard error body.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, req| bad_request(err, req)))
        .app_data(web::QueryConfig::default().error_handler(|err, req| bad_request(err, req)))
        .app_data(web::PathConfig::default().error_handler(|err, req| bad_request(err, req)))
        .route("/health", web::get().to(health_check))
        .route("/version", web::get().to(version_info))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/auth")
                        .route("/send-otp", web::post().to(auth::handlers::send_otp))
                        .route("/verify-otp", web::post().to(auth::handlers::verify_otp))
                        .route("/profile", web::get().to(auth::handlers::profile)),
                )
                .service(
                    web::scope("/users")
                        .route("", web::get().to(users::handlers::list_users))
                        .route("/stats", web::get().to(users::handlers::user_stats))
                        .route("/{id}", web::get().to(users::handlers::get_user)),
                ),
        );
}
