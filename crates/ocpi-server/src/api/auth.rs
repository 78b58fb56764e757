//! Request authentication
//!
//! Every OCPI request is classified by method and path:
//!
//! - **Public**: version discovery, no credentials needed.
//! - **Registration**: `POST /credentials`, authenticated with a usable
//!   bootstrap token A. A [`BootstrapGrant`] is attached to the request.
//! - **Peer**: everything else, authenticated with a token C belonging to a
//!   REGISTERED peer. A [`TenantContext`] is attached to the request.
//!
//! Failures all look the same from outside (HTTP 401, OCPI 2000); the
//! specific reason is logged.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::ApiError;
use super::handlers::AppState;
use super::paths;
use crate::core::TenantContext;

/// Header carrying the admin key on `/admin` routes
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Registration,
    Peer,
}

/// Bootstrap secret that passed the usability check for this request
#[derive(Clone)]
pub struct BootstrapGrant {
    pub secret: String,
}

pub fn classify(method: &Method, path: &str) -> RouteAccess {
    let path = path.trim_end_matches('/');
    if *method == Method::GET && (path == paths::VERSIONS || path == paths::VERSION_DETAILS) {
        RouteAccess::Public
    } else if *method == Method::POST && path == paths::CREDENTIALS {
        RouteAccess::Registration
    } else {
        RouteAccess::Peer
    }
}

fn bearer_token(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    state.codec.from_authorization_header_value(value)
}

/// Authenticate OCPI requests and attach the caller's identity
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let access = classify(request.method(), request.uri().path());
    if access == RouteAccess::Public {
        return Ok(next.run(request).await);
    }

    let Some(token) = bearer_token(&state, request.headers()) else {
        warn!(path = %request.uri().path(), "Missing or malformed Authorization header");
        return Err(ApiError::Unauthenticated);
    };

    match access {
        RouteAccess::Registration => {
            let usability = state.bootstrap.check_usable(&token).await?;
            if let Some(reason) = usability.reason {
                warn!(reason = %reason, "Registration attempt with unusable bootstrap token");
                return Err(ApiError::Unauthenticated);
            }
            request.extensions_mut().insert(BootstrapGrant { secret: token });
        }
        RouteAccess::Peer => {
            let Some(peer) = state.directory.find_by_bearer_token(&token).await? else {
                warn!(path = %request.uri().path(), "Request with unknown peer token");
                return Err(ApiError::Unauthenticated);
            };
            debug!(peer = %peer.identity, "Authenticated peer");
            request.extensions_mut().insert(TenantContext {
                peer_id: peer.id,
                identity: peer.identity,
                token,
            });
        }
        RouteAccess::Public => {}
    }

    Ok(next.run(request).await)
}

/// Guard `/admin` routes with the configured admin key
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_key_digest.as_deref() else {
        warn!("Admin request refused: no admin key configured");
        return Err(ApiError::Unauthenticated);
    };

    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() || !state.codec.verify(provided, expected) {
        warn!(path = %request.uri().path(), "Admin request with invalid key");
        return Err(ApiError::Unauthenticated);
    }

    Ok(next.run(request).await)
}
