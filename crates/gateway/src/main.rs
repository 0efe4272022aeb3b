//! SupportRAG API Gateway
//!
//! HTTP front-end for the support knowledge base.
//! Handles:
//! - Question answering over indexed articles
//! - Article uploads through the indexing pipeline
//! - Health and readiness probes
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use supportrag_common::{
    config::AppConfig,
    metrics,
    pipeline::{IndexingPipeline, Normalizer, QueryPipeline},
    services::ServiceHandles,
    store::VectorStore,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub query: Arc<QueryPipeline>,
    pub indexing: Arc<IndexingPipeline>,
    pub normalizer: Normalizer,
    pub store: Arc<dyn VectorStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, services: &ServiceHandles) -> Self {
        Self {
            query: Arc::new(services.query_pipeline(&config)),
            indexing: Arc::new(services.indexing_pipeline()),
            normalizer: Normalizer::default(),
            store: services.store.clone(),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load();

    // Initialize tracing
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_default();
    init_tracing(&observability.log_level, observability.json_logging);

    info!("Starting SupportRAG API Gateway v{}", supportrag_common::VERSION);

    // Load configuration
    let config = loaded.map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);
    info!(
        service = %config.observability.service_name,
        store = %config.vector_store.backend,
        top_k = config.retrieval.top_k,
        "Configuration loaded"
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Connect embedding, generation and storage services
    let services = ServiceHandles::connect(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize services");
        e
    })?;

    let state = AppState::new(config.clone(), &services);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Article exports routinely exceed axum's 2 MB default
    let upload_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    let api_routes = Router::new()
        .route("/query", post(handlers::query::query))
        .route(
            "/articles",
            post(handlers::articles::upload_articles).layer(upload_limit),
        );

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
