//! HTTP host surface for the CAS client.
//!
//! - `GET|POST <path_prefix>` redirects to the CAS login page
//! - `GET|POST <path_prefix>/callback` validates tickets and receives
//!   Single Sign-Out notifications
//! - `GET <failure_path>` reports a failed sign-in
//! - `GET /health` liveness check

mod cas;
mod error;
mod health;

use std::sync::Arc;

use axum::{Router, routing::get};
pub use error::RouteError;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{cas::CasStrategy, config::ServerConfig};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub strategy: Arc<CasStrategy>,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(strategy: CasStrategy, server: ServerConfig) -> Self {
        Self {
            strategy: Arc::new(strategy),
            server: Arc::new(server),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let prefix = state.server.path_prefix.clone();
    let body_limit = state.server.body_limit_bytes;

    Router::new()
        .route(&prefix, get(cas::request_phase).post(cas::request_phase))
        .route(
            &format!("{prefix}/callback"),
            get(cas::callback).post(cas::callback),
        )
        .route(&state.server.failure_path, get(cas::failure))
        .route("/health", get(health::liveness))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
