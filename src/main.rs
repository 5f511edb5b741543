//! Loan broker server
//!
//! Serves the rate card, offer, application and market analysis APIs and runs
//! the background offer expiration jobs.

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Json, Router};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use loan_broker_server::application::ApplicationService;
use loan_broker_server::audit::{AuditSink, PgAuditSink};
use loan_broker_server::config::Config;
use loan_broker_server::db;
use loan_broker_server::expiration::{
    ExpirationScheduler, ExpirationWarningService, OfferExpirationService,
};
use loan_broker_server::market::MarketAnalysisService;
use loan_broker_server::middleware;
use loan_broker_server::notification::{NotificationSink, PgNotificationSink};
use loan_broker_server::offer::{OfferCalculationService, OfferService};
use loan_broker_server::rate_card::RateCardService;
use loan_broker_server::routes;
use loan_broker_server::state::AppState;
use loan_broker_server::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = %config.environment.as_str(), "Starting loan broker server");

    // Initialize database connection pool
    let db_pool = db::connect(&config).await?;

    // Storage and side-effect sinks
    let store = Arc::new(PgStore::new(db_pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(db_pool.clone()));
    let notifications: Arc<dyn NotificationSink> =
        Arc::new(PgNotificationSink::new(db_pool.clone()));

    let rate_card_service = Arc::new(RateCardService::new(store.clone(), audit.clone()));

    let offer_calculation_service = Arc::new(OfferCalculationService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        audit.clone(),
        config.offer_settings(),
    ));

    let offer_service = Arc::new(OfferService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        audit.clone(),
        notifications.clone(),
    ));

    let application_service = Arc::new(ApplicationService::new(
        store.clone(),
        store.clone(),
        audit.clone(),
        notifications.clone(),
    ));

    let expiration_service = Arc::new(OfferExpirationService::new(
        store.clone(),
        audit.clone(),
        notifications.clone(),
        config.offer_expiration_concurrency,
    ));

    let warning_service = Arc::new(ExpirationWarningService::new(
        store.clone(),
        notifications.clone(),
        config.expiration_warning_window_hours,
    ));

    let market_service = Arc::new(MarketAnalysisService::new(store.clone()));

    // Start the expiration sweep and the expiry warning scan
    let scheduler = ExpirationScheduler::start(
        expiration_service.clone(),
        warning_service,
        &config.schedule_settings(),
    )
    .await
    .context("Failed to start expiration scheduler")?;

    // Create shared app state
    let app_state = AppState::new(
        rate_card_service,
        offer_calculation_service,
        offer_service,
        application_service,
        expiration_service,
        market_service,
    );

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check).with_state(db_pool))
        .merge(routes::api_router(app_state))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn root() -> &'static str {
    "Loan Broker API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(State(pool): State<PgPool>) -> Json<HealthResponse> {
    let db_status = match db::check_health(&pool).await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if db_status == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database: db_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins_str = allowed_origins.unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
