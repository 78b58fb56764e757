//! Tokens module handlers (receiver side)
//!
//! Peers push the tokens they issue. Every call is confined to the
//! authenticated peer's own `{country_code}/{party_id}`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use ocpi_core::{OcpiResponse, PhysicalToken};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::state::parse_token_type;
use super::AppState;
use crate::api::error::ApiError;
use crate::core::{TenantContext, TenantScope, TokenPatch};

#[derive(Debug, Default, Deserialize)]
pub struct TokenTypeQuery {
    #[serde(rename = "type")]
    pub token_type: Option<String>,
}

/// GET /ocpi/2.2.1/tokens/{country_code}/{party_id}/{token_uid}
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path((country_code, party_id, uid)): Path<(String, String, String)>,
    Query(query): Query<TokenTypeQuery>,
) -> Result<Json<OcpiResponse<PhysicalToken>>, ApiError> {
    let token_type = parse_token_type(query.token_type.as_deref())?;
    let scope = TenantScope::new(state.store.as_ref(), &ctx);

    scope
        .get_token(&country_code, &party_id, &uid, token_type)
        .await?
        .map(|token| Json(OcpiResponse::success(token)))
        .ok_or_else(|| ApiError::UnknownToken(format!("token {} not found", uid)))
}

/// PUT /ocpi/2.2.1/tokens/{country_code}/{party_id}/{token_uid}
pub async fn put_token(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path((country_code, party_id, uid)): Path<(String, String, String)>,
    Query(query): Query<TokenTypeQuery>,
    payload: Result<Json<PhysicalToken>, JsonRejection>,
) -> Result<Json<OcpiResponse<()>>, ApiError> {
    let Json(token) = payload?;
    let token_type = parse_token_type(query.token_type.as_deref())?;
    if token.token_type() != token_type {
        return Err(ApiError::InvalidParameters(format!(
            "type in body ({}) does not match the query ({})",
            token.token_type().as_str(),
            token_type.as_str()
        )));
    }

    let scope = TenantScope::new(state.store.as_ref(), &ctx);
    scope.put_token(&country_code, &party_id, &uid, token).await?;

    info!(peer = %ctx.identity, uid = %uid, "Stored token");
    Ok(Json(OcpiResponse::empty()))
}

/// PATCH /ocpi/2.2.1/tokens/{country_code}/{party_id}/{token_uid}
pub async fn patch_token(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path((country_code, party_id, uid)): Path<(String, String, String)>,
    Query(query): Query<TokenTypeQuery>,
    payload: Result<Json<TokenPatch>, JsonRejection>,
) -> Result<Json<OcpiResponse<()>>, ApiError> {
    let Json(patch) = payload?;
    let token_type = parse_token_type(query.token_type.as_deref())?;
    let scope = TenantScope::new(state.store.as_ref(), &ctx);

    match scope
        .patch_token(&country_code, &party_id, &uid, token_type, patch)
        .await?
    {
        Some(_) => {
            info!(peer = %ctx.identity, uid = %uid, "Patched token");
            Ok(Json(OcpiResponse::empty()))
        }
        None => Err(ApiError::UnknownToken(format!("token {} not found", uid))),
    }
}
