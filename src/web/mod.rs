pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::utils::error::AppError;
use crate::{models::ModelManager, Config, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub models: Arc<ModelManager>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let models = Arc::new(ModelManager::new(config.clone()));
        Self::with_models(config, models)
    }

    pub fn with_models(config: Config, models: Arc<ModelManager>) -> Self {
        Self {
            config: Arc::new(config),
            models,
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        AppError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    let app = create_app(AppState::new(config));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /            - Service info");
    tracing::info!("  GET  /health      - Health check");
    tracing::info!("  POST /ocr         - Multipart image upload");
    tracing::info!("  POST /transcribe  - Multipart audio upload");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let max_request_size = state.config.server_config.max_request_size;
    let request_timeout = Duration::from_secs(state.config.server_config.request_timeout);

    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/ocr", post(handlers::ocr_handler))
        .route("/transcribe", post(handlers::transcribe_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        // Multipart默认限制2MB，统一由RequestBodyLimitLayer控制
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
