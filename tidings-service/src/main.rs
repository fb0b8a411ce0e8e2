use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

use tidings_service::api;
use tidings_service::config::load_service_config;
use tidings_service::service::TidingsService;
use tidings_service::store::open_store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting Tidings service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_service_config()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );
    if config.auth.tokens.is_empty() {
        warn!("No auth tokens configured; every chat request will be rejected");
    }

    // Metrics are optional; the API still serves without a recorder
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install metrics recorder");
            None
        }
    };

    let store = open_store(&config.storage);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let service = Arc::new(TidingsService::new(config, store)?);
    let app = api::router(service, metrics);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tidings_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
