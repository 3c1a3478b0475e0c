//! fhir-proxy-server library crate
//!
//! Exposes `build_app`, `config` and the store `gateway` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod config;
mod error;
pub mod gateway;
mod middleware;
mod routes;

use std::sync::Arc;

use axum::{Extension, Router, extract::DefaultBodyLimit, middleware as axum_mw, routing::get};
use fhir_proxy_core::FhirProxy;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{Config, ResponseMode, ServiceInfo};
use middleware::ApiKeyAuth;

pub use middleware::auth::API_KEY_HEADER;
pub use middleware::request_id::REQUEST_ID_HEADER;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub proxy: FhirProxy,
    pub response_mode: ResponseMode,
    pub store_url: Arc<str>,
    pub service: ServiceInfo,
}

/// Build the full application router with all routes and middleware.
///
/// The proxy is passed in already wired to its store and token source so
/// integration tests can substitute both without binding to a TCP port.
pub fn build_app(proxy: FhirProxy, config: &Config) -> Router {
    let state = AppState {
        proxy,
        response_mode: config.response_mode,
        store_url: config.store.base_url().into(),
        service: config.service.clone(),
    };

    // Create auth state
    let auth = ApiKeyAuth::new(config.api_key.clone());

    // Create rate limiter
    let rate_limiter = middleware::create_rate_limiter(config.rate_limit_rps);

    // Request bodies are unbounded unless BODY_LIMIT_BYTES is set
    let body_limit = match config.body_limit_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    // Protected routes (require auth)
    let protected_routes = routes::proxy_routes()
        .layer(body_limit)
        .layer(axum_mw::from_fn(middleware::auth::auth_middleware))
        .layer(Extension(auth))
        .layer(axum_mw::from_fn(middleware::rate_limit_middleware))
        .layer(Extension(rate_limiter));

    // Install Prometheus metrics recorder.
    // build_recorder() + set_global_recorder() so repeated calls (integration
    // tests) keep the first recorder and still get a handle for /metrics.
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus_handle = recorder.handle();
    let _ = metrics::set_global_recorder(recorder);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(routes::landing::index))
        .route("/health", get(routes::ops::health))
        .route("/metrics", get(routes::ops::metrics))
        .layer(Extension(prometheus_handle));

    // Build CORS layer
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Build application
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_mw::from_fn(middleware::metrics_middleware))
}
