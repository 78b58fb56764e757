//! API module for the credentials plane server

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use ocpi_core::PeerStatus;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Route paths of the OCPI surface
pub mod paths {
    pub const VERSIONS: &str = "/ocpi/versions";
    pub const VERSION_DETAILS: &str = "/ocpi/2.2.1";
    pub const CREDENTIALS: &str = "/ocpi/2.2.1/credentials";
    pub const TOKEN: &str = "/ocpi/2.2.1/tokens/{country_code}/{party_id}/{token_uid}";
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub party: String,
    pub registered_peers: usize,
    pub bootstrap_tokens: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let peers = state.directory.list().await;
    let registered_peers = peers
        .as_ref()
        .map(|p| p.iter().filter(|p| p.status == PeerStatus::Registered).count())
        .unwrap_or(0);
    let bootstrap_tokens = state.bootstrap.list().await.map(|t| t.len()).unwrap_or(0);

    Json(ReadyResponse {
        ready: peers.is_ok(),
        party: state.config.identity().to_string(),
        registered_peers,
        bootstrap_tokens,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ocpi = Router::new()
        // Discovery
        .route(paths::VERSIONS, get(handlers::get_versions))
        .route(paths::VERSION_DETAILS, get(handlers::get_version_details))
        // Credentials
        .route(
            paths::CREDENTIALS,
            get(handlers::get_credentials)
                .post(handlers::post_credentials)
                .put(handlers::put_credentials)
                .delete(handlers::delete_credentials),
        )
        // Tokens (receiver)
        .route(
            paths::TOKEN,
            get(handlers::get_token)
                .put(handlers::put_token)
                .patch(handlers::patch_token),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authenticate));

    let admin = Router::new()
        .route(
            "/admin/bootstrap-tokens",
            post(handlers::issue_bootstrap_token).get(handlers::list_bootstrap_tokens),
        )
        .route(
            "/admin/bootstrap-tokens/cleanup",
            post(handlers::cleanup_bootstrap_tokens),
        )
        .route(
            "/admin/bootstrap-tokens/{id}",
            delete(handlers::deactivate_bootstrap_token),
        )
        .route("/admin/peers", get(handlers::list_peers))
        .route(
            "/admin/peers/{country_code}/{party_id}",
            delete(handlers::remove_peer),
        )
        .route("/admin/tokens/{uid}/authorize", post(handlers::authorize_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        .merge(ocpi)
        .merge(admin)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
