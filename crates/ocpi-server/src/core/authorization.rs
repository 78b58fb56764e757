//! Real-time token authorization
//!
//! Decides whether a physical token may start a session. The decision is a
//! pure function of the token's `valid` flag and whitelist policy, except
//! where the policy requires asking the issuer:
//!
//! | valid | whitelist        | outcome                                    |
//! |-------|------------------|--------------------------------------------|
//! | false | any              | BLOCKED                                    |
//! | true  | ALWAYS, ALLOWED  | ALLOWED                                    |
//! | true  | ALLOWED_OFFLINE  | ask issuer; ALLOWED if the issuer is down  |
//! | true  | NEVER            | ask issuer; failure is an error            |
//!
//! A uid pushed by more than one issuer is ambiguous: the caller must name
//! the issuer, otherwise no decision is made.

use async_trait::async_trait;
use ocpi_bridge::{RealtimeAuthorization, RemoteAuthorization};
use ocpi_core::versions::modules;
use ocpi_core::{
    AllowedType, AuthorizationInfo, DisplayText, InterfaceRole, LocationReferences, PartyIdentity,
    PeerStatus, PhysicalToken, TokenType, WhitelistType,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::registry::PeerDirectory;
use crate::storage::{OcpiStore, StorageError};

#[derive(Error, Debug, Clone)]
pub enum AuthorizationError {
    #[error("unknown token {uid} ({token_type})")]
    UnknownToken { uid: String, token_type: String },

    #[error("token {uid} is issued by several parties ({})", .owners.join(", "))]
    AmbiguousToken { uid: String, owners: Vec<String> },

    #[error("issuer confirmation failed: {0}")]
    ConfirmationFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Asks a token's issuer to confirm an authorization
#[async_trait]
pub trait TokenConfirmation: Send + Sync {
    async fn confirm(
        &self,
        token: &PhysicalToken,
        location: Option<&LocationReferences>,
    ) -> Result<RemoteAuthorization, AuthorizationError>;
}

/// Confirms with the registered peer that owns the token, through the
/// tokens endpoint it advertised as SENDER.
pub struct PeerTokenConfirmation {
    directory: Arc<PeerDirectory>,
    client: Arc<dyn RealtimeAuthorization>,
}

impl PeerTokenConfirmation {
    pub fn new(directory: Arc<PeerDirectory>, client: Arc<dyn RealtimeAuthorization>) -> Self {
        Self { directory, client }
    }
}

#[async_trait]
impl TokenConfirmation for PeerTokenConfirmation {
    async fn confirm(
        &self,
        token: &PhysicalToken,
        location: Option<&LocationReferences>,
    ) -> Result<RemoteAuthorization, AuthorizationError> {
        let owner = token.owner();
        let peer = self
            .directory
            .find_by_identity(&owner)
            .await?
            .filter(|p| p.status == PeerStatus::Registered)
            .ok_or_else(|| {
                AuthorizationError::ConfirmationFailed(format!("issuer {} is not registered", owner))
            })?;

        let endpoint = self
            .directory
            .endpoint_for(peer.id, modules::TOKENS, InterfaceRole::Sender)
            .await?
            .ok_or_else(|| {
                AuthorizationError::ConfirmationFailed(format!(
                    "issuer {} exposes no tokens endpoint",
                    owner
                ))
            })?;

        self.client
            .authorize(
                &endpoint.url,
                &peer.our_token_for_peer,
                token.uid(),
                token.token_type(),
                location,
            )
            .await
            .map_err(|e| AuthorizationError::ConfirmationFailed(e.to_string()))
    }
}

pub struct TokenAuthorizationEngine {
    store: Arc<dyn OcpiStore>,
    confirmation: Arc<dyn TokenConfirmation>,
}

impl TokenAuthorizationEngine {
    pub fn new(store: Arc<dyn OcpiStore>, confirmation: Arc<dyn TokenConfirmation>) -> Self {
        Self { store, confirmation }
    }

    /// Authorize the token `uid` of `token_type`, optionally at a location.
    ///
    /// Fails with `AmbiguousToken` when several issuers pushed this uid.
    pub async fn authorize(
        &self,
        uid: &str,
        token_type: TokenType,
        location: Option<LocationReferences>,
    ) -> Result<AuthorizationInfo, AuthorizationError> {
        let mut matches = self.store.find_physical_tokens(uid, token_type).await?;
        let token = match matches.len() {
            0 => return Err(unknown(uid, token_type)),
            1 => matches.remove(0),
            _ => {
                let owners: Vec<String> = matches.iter().map(|t| t.owner().to_string()).collect();
                warn!(uid = %uid, owners = ?owners, "Token uid claimed by several issuers");
                return Err(AuthorizationError::AmbiguousToken {
                    uid: uid.to_string(),
                    owners,
                });
            }
        };
        self.decide(token, location).await
    }

    /// Authorize the token `uid` pushed by `issuer`
    pub async fn authorize_issued_by(
        &self,
        issuer: &PartyIdentity,
        uid: &str,
        token_type: TokenType,
        location: Option<LocationReferences>,
    ) -> Result<AuthorizationInfo, AuthorizationError> {
        let token = self
            .store
            .get_physical_token(issuer, uid, token_type)
            .await?
            .ok_or_else(|| unknown(uid, token_type))?;
        self.decide(token, location).await
    }

    async fn decide(
        &self,
        token: PhysicalToken,
        location: Option<LocationReferences>,
    ) -> Result<AuthorizationInfo, AuthorizationError> {
        let uid = token.uid().to_string();
        let token_type = token.token_type();
        let info = match (token.is_valid(), token.whitelist()) {
            (false, _) => local(token, AllowedType::Blocked, location),
            (true, WhitelistType::Always | WhitelistType::Allowed) => {
                local(token, AllowedType::Allowed, location)
            }
            (true, WhitelistType::AllowedOffline) => {
                let outcome = self.confirmation.confirm(&token, location.as_ref()).await;
                match outcome {
                    Ok(remote) => confirmed(token, remote, location),
                    Err(e) => {
                        warn!(uid = %uid, error = %e, "Issuer unavailable, allowing from whitelist");
                        local(token, AllowedType::Allowed, location)
                    }
                }
            }
            (true, WhitelistType::Never) => {
                let remote = self
                    .confirmation
                    .confirm(&token, location.as_ref())
                    .await
                    .inspect_err(|e| warn!(uid = %uid, error = %e, "Issuer confirmation failed"))?;
                confirmed(token, remote, location)
            }
        };

        info!(
            uid = %uid,
            token_type = %token_type.as_str(),
            allowed = ?info.allowed,
            "Token authorization decided"
        );
        Ok(info)
    }
}

fn unknown(uid: &str, token_type: TokenType) -> AuthorizationError {
    AuthorizationError::UnknownToken {
        uid: uid.to_string(),
        token_type: token_type.as_str().to_string(),
    }
}

fn local(
    token: PhysicalToken,
    allowed: AllowedType,
    location: Option<LocationReferences>,
) -> AuthorizationInfo {
    AuthorizationInfo {
        allowed,
        token,
        location,
        authorization_reference: Some(new_reference()),
        info: Some(DisplayText::en(describe(allowed))),
    }
}

fn confirmed(
    token: PhysicalToken,
    remote: RemoteAuthorization,
    location: Option<LocationReferences>,
) -> AuthorizationInfo {
    AuthorizationInfo {
        allowed: remote.allowed,
        token,
        location,
        authorization_reference: remote.authorization_reference.or_else(|| Some(new_reference())),
        info: remote.info.or_else(|| Some(DisplayText::en(describe(remote.allowed)))),
    }
}

// 32 hex chars; the field allows 36.
fn new_reference() -> String {
    Uuid::new_v4().simple().to_string()
}

fn describe(allowed: AllowedType) -> &'static str {
    match allowed {
        AllowedType::Allowed => "Charging allowed",
        AllowedType::Blocked => "Token is blocked",
        AllowedType::Expired => "Token has expired",
        AllowedType::NoCredit => "Insufficient credit",
        AllowedType::NotAllowed => "Token not allowed at this location",
    }
}
