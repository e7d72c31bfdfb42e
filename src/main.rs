use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use phone_auth_server::{configure_routes, AppState, PgStore, Settings, TracingAuditSink};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(environment: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if environment == "development" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Load configuration
    let config = Settings::new().context("Failed to load configuration")?;
    init_tracing(&config.environment);
    config.validate()?;
    info!(environment = %config.environment, "Configuration loaded successfully");

    let store = Arc::new(
        PgStore::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_seconds),
        )
        .await
        .context("Failed to connect to the database")?,
    );
    store.migrate().await.context("Failed to run database migrations")?;
    info!("Database ready");

    let state = web::Data::new(AppState::with_store(
        config.clone(),
        store.clone(),
        Arc::new(TracingAuditSink),
    ));

    // Periodic removal of expired codes and old rate-limit attempts
    let maintenance_state = state.clone();
    let cleanup_interval = config.otp.cleanup_interval();
    let maintenance = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            ticker.tick().await;
            let report = maintenance_state.otp_service.run_maintenance().await;
            if report.failures > 0 {
                warn!(failures = report.failures, "Maintenance pass finished with failures");
            }
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        let cors = if cors_config.enabled {
            let cors = Cors::default();

            let cors = if cors_config.allow_any_origin {
                cors.allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            } else {
                cors.allowed_origin("http://localhost:8080")
                    .allowed_origin("http://127.0.0.1:8080")
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers(vec!["Authorization", "Content-Type"])
            };

            cors.max_age(cors_config.max_age as usize)
        } else {
            // CORS disabled - use most restrictive settings
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    maintenance.abort();
    store.close().await;
    info!("Server stopped");

    Ok(())
}
