// Atelier Server Library
// Decision: Shared library for binaries (API server, OpenAPI export) and integration tests
// Decision: Route assembly lives here so tests exercise the exact router the server runs

// API routes and types (shared for OpenAPI generation)
pub mod api;

// Authentication: session resolution, authorization gate, guard extractors
pub mod auth;

// Environment configuration
pub mod config;

// Error taxonomy and its HTTP mapping
pub mod error;

// Services layer
pub mod services;
pub use services::QuoteService;

// Storage layer
pub mod storage;

// Logging
pub mod telemetry;

// OpenAPI spec generation
pub mod openapi;

use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// All API routes, every one of them behind the auth extractors where required
pub fn api_routes(auth_state: AuthState) -> Router {
    let quotes_state = api::quotes::AppState::new(auth_state.clone());
    let users_state = api::users::UsersState {
        auth: auth_state.clone(),
    };

    Router::new()
        .merge(api::quotes::routes(quotes_state))
        .merge(api::users::routes(users_state.clone()))
        .merge(api::admin::routes(users_state))
        .merge(auth::routes(auth_state))
}

/// Full application router: unprefixed /health plus the (optionally prefixed) API
pub fn build_app(auth_state: AuthState, api_prefix: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(build_router_with_prefix(api_routes(auth_state), api_prefix))
}

/// Build router with optional API prefix
pub fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
