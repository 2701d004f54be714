//! # API REST
//!
//! REST API for the filing service.
//!
//! Handles:
//! - HTTP endpoints with axum (`/upload`, `/download`, `/health`)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart parsing, status mapping, body limits, CORS)
//!
//! The write protocol itself lives in `filing-files`; handlers run it on the blocking pool.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use filing_core::{CoreConfig, CoreResult, RescanNotifier};
use filing_files::{Filestore, RelativePath};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::{status_for, ApiError};

/// Application state for the REST API server
///
/// Shared by all request handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Filestore>,
    notifier: Option<Arc<dyn RescanNotifier>>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Filestore, max_upload_bytes: u64) -> Self {
        Self {
            store: Arc::new(store),
            notifier: None,
            max_upload_bytes: usize::try_from(max_upload_bytes).unwrap_or(usize::MAX),
        }
    }

    /// Builds the state described by `cfg`: its filestore, body limit and notifier.
    pub fn from_config(cfg: &CoreConfig) -> CoreResult<Self> {
        let state = Self::new(cfg.filestore()?, cfg.max_upload_bytes());
        Ok(match cfg.notifier() {
            Some(notifier) => state.with_notifier(notifier),
            None => state,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RescanNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Filestore {
        &self.store
    }

    /// Asks the notifier to rescan `dir` without waiting for it. Failures are only logged.
    pub(crate) fn spawn_rescan(&self, dir: Option<RelativePath>) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };

        tokio::task::spawn_blocking(move || {
            if let Err(e) = notifier.rescan(dir.as_ref()) {
                tracing::warn!(
                    dir = dir.as_ref().map(RelativePath::as_str).unwrap_or("/"),
                    "Content index rescan failed: {}",
                    e
                );
            }
        });
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health,
        routes::upload,
        routes::delete_file,
        routes::download,
    ),
    components(schemas(api_shared::HealthRes, api_shared::UploadRes))
)]
pub struct ApiDoc;

/// Builds the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/upload/*path",
            put(routes::upload)
                .post(routes::upload)
                .delete(routes::delete_file),
        )
        .route("/download/*path", get(routes::download))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves on Ctrl-C so in-flight requests can finish before the server exits.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
