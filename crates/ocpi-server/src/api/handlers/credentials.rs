//! Credentials module handlers
//!
//! POST registers a new peer (bootstrap token A), PUT rotates, DELETE
//! unregisters, GET returns the credentials the caller should be using.

use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use ocpi_core::{Credentials, OcpiResponse};
use std::sync::Arc;

use super::AppState;
use crate::api::auth::BootstrapGrant;
use crate::api::error::ApiError;
use crate::core::TenantContext;

/// Our credentials as seen by the authenticated peer
///
/// GET /ocpi/2.2.1/credentials
pub async fn get_credentials(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
) -> Json<OcpiResponse<Credentials>> {
    Json(OcpiResponse::success(state.handshake.own_credentials(&ctx.token)))
}

/// Register a new peer
///
/// POST /ocpi/2.2.1/credentials
pub async fn post_credentials(
    State(state): State<Arc<AppState>>,
    Extension(grant): Extension<BootstrapGrant>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<OcpiResponse<Credentials>>, ApiError> {
    let Json(credentials) = payload?;
    let ours = state.handshake.register(&grant.secret, credentials).await?;
    Ok(Json(OcpiResponse::success(ours)))
}

/// Rotate the caller's credentials
///
/// PUT /ocpi/2.2.1/credentials
pub async fn put_credentials(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<OcpiResponse<Credentials>>, ApiError> {
    let Json(credentials) = payload?;
    let ours = state.handshake.rotate(&ctx, credentials).await?;
    Ok(Json(OcpiResponse::success(ours)))
}

/// Unregister the caller
///
/// DELETE /ocpi/2.2.1/credentials
pub async fn delete_credentials(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<OcpiResponse<()>>, ApiError> {
    state.handshake.unregister(&ctx).await?;
    Ok(Json(OcpiResponse::empty()))
}
