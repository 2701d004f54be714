use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router, shutdown_signal};
use filing_core::{CoreConfig, DEFAULT_REST_ADDR, ENV_REST_ADDR};

/// Main entry point for the filing service
///
/// Loads `.env`, resolves configuration once and serves the REST API until Ctrl-C.
///
/// # Environment Variables
/// - `FILING_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FILING_UPLOAD_DIR`: Upload directory, must exist (default: "upload_data")
/// - `FILING_STAGING_DIR`: Staging root (default: system temp directory)
/// - `FILING_SIDECARS`: Write `.sha256` sidecar files (default: false)
/// - `FILING_MAX_UPLOAD_BYTES`, `FILING_MAX_ARCHIVE_ENTRIES`, `FILING_MAX_ARCHIVE_BYTES`: Limits
/// - `FILING_NC_USER`, `FILING_NC_FOLDER`, `FILING_OCC_PATH`, `FILING_PHP_PATH`: Nextcloud rescan
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, binding or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("filing=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let cfg = CoreConfig::from_env()?;
    let state = AppState::from_config(&cfg)?;

    tracing::info!("++ Starting filing REST on {}", rest_addr);
    tracing::info!(
        upload_dir = %state.store().base_dir().display(),
        sidecars = cfg.write_sidecars(),
        rescan = cfg.nextcloud().is_some(),
        "++ Filestore ready"
    );

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Filing service stopped");
    Ok(())
}
