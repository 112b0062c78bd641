pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;
pub mod uploads;

use crate::config::ServerConfig;
use crate::{classify::ClassifierService, models::LayerRegistry, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

pub use uploads::UploadStore;

/// 路由共享状态
pub struct AppState {
    pub service: ClassifierService,
    pub uploads: UploadStore,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: ClassifierService, uploads: UploadStore) -> Self {
        Self {
            service,
            uploads,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

pub async fn serve(config: Config) -> Result<()> {
    // 启动时构建一次分类服务，失败时降级运行
    let service = ClassifierService::from_config(&config)?;
    let uploads = UploadStore::new(&config.upload_dir).await?;
    let state = Arc::new(AppState::new(service, uploads));

    let app = create_app(state, &config.server_config);

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        crate::utils::error::ClassifyError::Config(format!(
            "Invalid bind address {}: {}",
            config.bind_addr, e
        ))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict      - Multipart image upload");
    tracing::info!("  POST /predict/json - JSON base64 upload");
    tracing::info!("  GET  /             - Web UI");
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  GET  /api/info     - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        crate::utils::error::ClassifyError::Internal(format!(
            "Failed to bind to address {}: {}",
            addr, e
        ))
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            crate::utils::error::ClassifyError::Internal(format!("Server failed: {}", e))
        })?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn create_app(state: SharedState, server_config: &ServerConfig) -> Router {
    Router::new()
        // 分类API路由
        .route("/predict", post(handlers::predict_upload_handler))
        .route("/predict/json", post(handlers::predict_json_handler))
        // Web UI路由
        .route("/", get(ui::index_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// 健康检查端点
async fn health_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let model_loaded = state.service.is_ready();
    let status = if model_loaded { "healthy" } else { "degraded" };
    Json(json!({
        "status": status,
        "model_loaded": model_loaded,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 服务信息端点
async fn info_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let labels = state.service.labels();
    Json(json!({
        "service": "ONNX Image Classification Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": state.service.model_stats(),
        "labels": {
            "count": labels.len(),
            "names": labels.iter().collect::<Vec<_>>(),
        },
        "registered_layers": LayerRegistry::with_augmentation_layers().names(),
        "upload_dir": state.uploads.dir().display().to_string(),
    }))
}
