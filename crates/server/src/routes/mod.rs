pub mod landing;
pub mod ops;
mod proxy;

use axum::{Router, routing::post};

use crate::AppState;

/// Build the proxy routes
pub fn proxy_routes() -> Router<AppState> {
    Router::new().route("/fhir-proxy", post(proxy::submit))
}
