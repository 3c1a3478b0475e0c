//! fhir-proxy-server: FHIR normalizing proxy binary entrypoint.

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fhir_proxy_server::config::Config;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Invalid configuration");

    // Wire the pipeline to the store
    let proxy = fhir_proxy_server::gateway::proxy_from_config(&config)
        .expect("Failed to create store gateway");

    // Log startup info
    tracing::info!(store = %config.store.base_url(), "Forwarding resources to FHIR store");
    if config.access_token.is_some() {
        tracing::info!("Using static access token from FHIR_PROXY_ACCESS_TOKEN");
    } else if let Some(path) = &config.credentials_file {
        tracing::info!(key_file = %path.display(), "Using service account key credentials");
    } else {
        tracing::info!(
            metadata_host = %config.metadata_host,
            "Using metadata server credentials"
        );
    }
    if config.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("API key authentication disabled (no API_KEY env var)");
    }
    tracing::info!(
        system = %config.identity.system,
        value = %config.identity.value,
        response_mode = ?config.response_mode,
        "Proxy identity"
    );
    tracing::info!("Rate limiting: {} requests/second", config.rate_limit_rps);
    match config.body_limit_bytes {
        Some(limit) => tracing::info!("Request body limit: {} bytes", limit),
        None => tracing::info!("Request body size unbounded"),
    }

    // Build application
    let app = fhir_proxy_server::build_app(proxy, &config);

    // Start server
    let addr: SocketAddr = config.bind_address.parse().expect("Invalid bind address");
    tracing::info!("Starting FHIR proxy on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
