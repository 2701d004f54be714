//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without loading `.env`.
//!
//! ## Intended use
//! Development and debugging with explicitly exported environment variables. The workspace's
//! main `filing-run` binary is the deployable entry point.

use api_rest::{router, AppState};
use filing_core::{CoreConfig, DEFAULT_REST_ADDR, ENV_REST_ADDR};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the filing REST API server
///
/// # Environment Variables
/// - `FILING_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `FILING_UPLOAD_DIR` and the other `FILING_*` settings read by [`CoreConfig::from_env`]
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the upload directory does not exist,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("filing=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let cfg = CoreConfig::from_env()?;
    let state = AppState::from_config(&cfg)?;

    tracing::info!("-- Starting filing REST API on {}", addr);
    tracing::info!("-- Upload directory: {}", state.store().base_dir().display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(api_rest::shutdown_signal())
        .await?;

    Ok(())
}
