//! Application startup and lifecycle management.

use crate::config::VisionConfig;
use crate::handlers;
use crate::services::providers::groq::{GroqConfig, GroqVisionProvider};
use crate::services::providers::VisionProvider;
use crate::services::{InferenceRelay, ScratchDir};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: VisionConfig,
    pub relay: InferenceRelay,
}

impl AppState {
    /// Wire the relay around `provider` and open the scratch directory.
    pub async fn new(
        config: VisionConfig,
        provider: Arc<dyn VisionProvider>,
    ) -> Result<Self, AppError> {
        let scratch = ScratchDir::create(&config.scratch.dir).await.map_err(|e| {
            tracing::error!(
                "Failed to create scratch directory {}: {}",
                config.scratch.dir,
                e
            );
            AppError::from(e)
        })?;

        let relay = InferenceRelay::new(provider, scratch, config.completion.timeout());

        Ok(Self { config, relay })
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.scratch.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against the configured completion API.
    pub async fn build(config: VisionConfig) -> Result<Self, AppError> {
        let provider = GroqVisionProvider::new(GroqConfig {
            api_key: config.completion.api_key.clone(),
            base_url: config.completion.base_url.clone(),
            model: config.completion.model.clone(),
            timeout: config.completion.timeout(),
        })
        .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        tracing::info!(
            model = %config.completion.model,
            base_url = %config.completion.base_url,
            timeout_secs = config.completion.timeout_secs,
            "Initialized completion provider"
        );

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: VisionConfig,
        provider: Arc<dyn VisionProvider>,
    ) -> Result<Self, AppError> {
        let state = AppState::new(config, provider).await?;

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            scratch_dir = %state.config.scratch.dir,
            "Vision service listening on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
