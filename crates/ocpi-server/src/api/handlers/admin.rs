//! Operator handlers
//!
//! Mounted under `/admin` behind the admin key. Bootstrap token and peer
//! management answers are plain JSON; the authorization trigger answers in
//! the OCPI envelope since its payload is an OCPI object.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use ocpi_core::{
    AuthorizationInfo, BootstrapToken, LocationReferences, OcpiResponse, PartyIdentity, Peer,
    PeerStatus, Role, VersionNumber,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::state::parse_token_type;
use super::AppState;
use crate::api::error::ApiError;
use crate::registry::IssuedBootstrapToken;

#[derive(Debug, Default, Deserialize)]
pub struct IssueBootstrapTokenRequest {
    #[serde(default)]
    pub description: Option<String>,
    /// 1 to 365; anything else issues a token that never expires
    #[serde(default)]
    pub expires_in_days: Option<i64>,
}

/// Query of the authorization trigger. The issuer is required when the uid
/// was pushed by more than one party.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(rename = "type")]
    pub token_type: Option<String>,
    pub country_code: Option<String>,
    pub party_id: Option<String>,
}

/// Peer as shown to operators. Never includes token material.
#[derive(Debug, Serialize)]
pub struct PeerSummary {
    pub id: Uuid,
    pub country_code: String,
    pub party_id: String,
    pub roles: Vec<Role>,
    pub url: String,
    pub status: PeerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionNumber>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Peer> for PeerSummary {
    fn from(peer: Peer) -> Self {
        Self {
            id: peer.id,
            country_code: peer.identity.country_code,
            party_id: peer.identity.party_id,
            roles: peer.roles.iter().map(|r| r.role).collect(),
            url: peer.url,
            status: peer.status,
            version: peer.version,
            created_at: peer.created_at,
            updated_at: peer.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

/// POST /admin/bootstrap-tokens
pub async fn issue_bootstrap_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IssueBootstrapTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedBootstrapToken>), ApiError> {
    let Json(request) = payload?;
    let issued = state
        .bootstrap
        .issue(request.description, request.expires_in_days)
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// GET /admin/bootstrap-tokens
pub async fn list_bootstrap_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BootstrapToken>>, ApiError> {
    Ok(Json(state.bootstrap.list().await?))
}

/// DELETE /admin/bootstrap-tokens/{id}
pub async fn deactivate_bootstrap_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.bootstrap.deactivate(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("bootstrap token {} not found", id)))
    }
}

/// POST /admin/bootstrap-tokens/cleanup
pub async fn cleanup_bootstrap_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let removed = state.bootstrap.purge_expired().await?;
    Ok(Json(CleanupResponse { removed }))
}

/// GET /admin/peers
pub async fn list_peers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PeerSummary>>, ApiError> {
    let peers = state.directory.list().await?;
    Ok(Json(peers.into_iter().map(PeerSummary::from).collect()))
}

/// Forget a peer so the identity can register again
///
/// DELETE /admin/peers/{country_code}/{party_id}
pub async fn remove_peer(
    State(state): State<Arc<AppState>>,
    Path((country_code, party_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let identity = PartyIdentity::new(&country_code, &party_id);
    if state.directory.remove(&identity).await? {
        info!(peer = %identity, "Peer removed by operator");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("peer {} not found", identity)))
    }
}

/// Ask for an authorization decision, as a charge point would
///
/// POST /admin/tokens/{uid}/authorize?type=RFID[&country_code=NL&party_id=TST]
///
/// The body is an optional `LocationReferences` object.
pub async fn authorize_token(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Query(query): Query<AuthorizeQuery>,
    body: Bytes,
) -> Result<Json<OcpiResponse<AuthorizationInfo>>, ApiError> {
    let token_type = parse_token_type(query.token_type.as_deref())?;
    let location: Option<LocationReferences> = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|e| ApiError::InvalidParameters(format!("invalid location: {}", e)))?,
        )
    };

    let decision = match (query.country_code, query.party_id) {
        (Some(country_code), Some(party_id)) => {
            let issuer = PartyIdentity::new(&country_code, &party_id);
            state
                .authorization
                .authorize_issued_by(&issuer, &uid, token_type, location)
                .await?
        }
        (None, None) => state.authorization.authorize(&uid, token_type, location).await?,
        _ => {
            return Err(ApiError::InvalidParameters(
                "country_code and party_id must be given together".into(),
            ))
        }
    };
    Ok(Json(OcpiResponse::success(decision)))
}
