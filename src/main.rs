//! Reputation Core - reputation scoring backend
//!
//! This service evaluates dynamic flags against entity metadata,
//! combines them into a reputation score and classifies risk.

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;

mod api;
mod auth;
mod config;
mod domain;
mod engine;
mod error;
mod logging;
mod storage;

use crate::api::build_router;
use crate::auth::ApiKeyValidator;
use crate::config::Config;
use crate::engine::{FlagEngine, ReputationCoordinator, RiskAssessor, WeightedAverageAggregator};
use crate::storage::ReputationRepository;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The reputation coordinator.
    pub coordinator: Arc<ReputationCoordinator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    logging::init();

    tracing::info!("Starting Reputation Core v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        auth_enabled = %config.auth.enabled,
        algorithm_version = %config.scoring.algorithm_version,
        "Configuration loaded"
    );

    let pool = SqlitePool::connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    let repository = ReputationRepository::new(pool);
    repository.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        anyhow::anyhow!("Schema initialization error: {}", e)
    })?;

    tracing::info!("Database connected and schema initialized");

    let coordinator = Arc::new(ReputationCoordinator::new(
        repository,
        FlagEngine::new(),
        Box::new(WeightedAverageAggregator::new(
            config.scoring.algorithm_version.clone(),
        )),
        RiskAssessor::new(),
    ));

    let api_key_validator = ApiKeyValidator::new(config.auth.api_keys.clone());

    if config.auth.enabled {
        if api_key_validator.is_empty() {
            tracing::warn!("Authentication enabled but no API keys configured - all protected routes will reject");
        }
        tracing::info!(api_keys = config.auth.api_keys.len(), "Authentication enabled");
    } else {
        tracing::warn!("Authentication is DISABLED - enable for production");
    }

    let state = AppState { coordinator };
    let app = build_router(state, config.auth.enabled, api_key_validator);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
