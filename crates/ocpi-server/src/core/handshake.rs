//! Credentials handshake
//!
//! Drives the three peer-facing credential flows:
//!
//! - **register** (POST): a new party presents a bootstrap token A and its
//!   own credentials carrying token B. We negotiate a version against its
//!   discovery URL, issue token C, then commit the peer and consume token A
//!   in one store write.
//! - **rotate** (PUT): a registered party replaces its credentials. Same
//!   negotiation, fresh token C, no bootstrap involved.
//! - **unregister** (DELETE): the peer moves to REVOKED for good.
//!
//! Negotiation happens before anything is committed, so a failed handshake
//! never leaves a peer REGISTERED and never burns token A. If token A is
//! used by someone else while we negotiate, the commit is refused as a whole.

use ocpi_bridge::{BridgeError, VersionNegotiator};
use ocpi_core::validation::validate_credentials;
use ocpi_core::{Credentials, CredentialsRole, PartyIdentity, TokenCodec, UnusableReason, ValidationError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::scope::TenantContext;
use crate::registry::{BootstrapError, BootstrapTokenStore, DirectoryError, PeerDirectory};
use crate::storage::StorageError;

#[derive(Error, Debug, Clone)]
pub enum HandshakeError {
    #[error("bootstrap token unusable: {0}")]
    Bootstrap(UnusableReason),

    #[error("{0}")]
    InvalidParameters(String),

    #[error("peer {0} is revoked")]
    PeerRevoked(PartyIdentity),

    #[error("no mutually supported version (peer offers {offered:?})")]
    NoMatchingVersion { offered: Vec<String> },

    #[error("unable to use the peer's API: {0}")]
    UnreachablePeer(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ValidationError> for HandshakeError {
    fn from(e: ValidationError) -> Self {
        HandshakeError::InvalidParameters(e.to_string())
    }
}

impl From<BridgeError> for HandshakeError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::NoMatchingVersion { offered } => HandshakeError::NoMatchingVersion { offered },
            other => HandshakeError::UnreachablePeer(other.to_string()),
        }
    }
}

impl From<DirectoryError> for HandshakeError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Revoked(identity) => HandshakeError::PeerRevoked(identity),
            DirectoryError::MissingRole => {
                HandshakeError::InvalidParameters("credentials declare no role".into())
            }
            DirectoryError::BootstrapConsumed => HandshakeError::Bootstrap(UnusableReason::AlreadyUsed),
            DirectoryError::Storage(e) => HandshakeError::Storage(e),
        }
    }
}

impl From<BootstrapError> for HandshakeError {
    fn from(e: BootstrapError) -> Self {
        match e {
            BootstrapError::Unusable(reason) => HandshakeError::Bootstrap(reason),
            BootstrapError::Storage(e) => HandshakeError::Storage(e),
        }
    }
}

/// What we tell peers about ourselves
#[derive(Debug, Clone)]
pub struct OwnCredentials {
    /// Our versions discovery URL
    pub url: String,
    pub roles: Vec<CredentialsRole>,
}

pub struct CredentialsHandshake {
    bootstrap: Arc<BootstrapTokenStore>,
    directory: Arc<PeerDirectory>,
    negotiator: Arc<VersionNegotiator>,
    own: OwnCredentials,
}

impl CredentialsHandshake {
    pub fn new(
        bootstrap: Arc<BootstrapTokenStore>,
        directory: Arc<PeerDirectory>,
        negotiator: Arc<VersionNegotiator>,
        own: OwnCredentials,
    ) -> Self {
        Self {
            bootstrap,
            directory,
            negotiator,
            own,
        }
    }

    /// Our credentials object, carrying `token` for the peer to use
    pub fn own_credentials(&self, token: &str) -> Credentials {
        Credentials {
            token: token.to_string(),
            url: self.own.url.clone(),
            roles: self.own.roles.clone(),
        }
    }

    /// First registration of a peer, authorized by bootstrap token A.
    ///
    /// Returns our credentials carrying the new token C.
    pub async fn register(
        &self,
        bootstrap_secret: &str,
        credentials: Credentials,
    ) -> Result<Credentials, HandshakeError> {
        validate_credentials(&credentials)?;

        if let Some(reason) = self.bootstrap.check_usable(bootstrap_secret).await?.reason {
            warn!(reason = %reason, "Registration with unusable bootstrap token");
            return Err(HandshakeError::Bootstrap(reason));
        }

        let peer = self.directory.upsert_from_incoming_credentials(&credentials).await?;
        info!(peer = %peer.identity, url = %credentials.url, "Registering peer");

        let negotiated = self
            .negotiator
            .negotiate(&credentials.url, &credentials.token)
            .await
            .inspect_err(|e| warn!(peer = %peer.identity, error = %e, "Negotiation failed"))?;

        let claim = self
            .bootstrap
            .claim(bootstrap_secret, &peer.identity.to_string())
            .await?;

        let token_c = TokenCodec::generate_token();
        let peer = self
            .directory
            .commit_negotiated_credentials(
                peer.id,
                &token_c,
                negotiated.version,
                negotiated.endpoints,
                &credentials,
                Some(claim),
            )
            .await?;

        info!(peer = %peer.identity, version = %negotiated.version, "Peer registration complete");
        Ok(self.own_credentials(&token_c))
    }

    /// Replace the credentials of an already registered peer.
    ///
    /// The body must describe the authenticated party itself.
    pub async fn rotate(
        &self,
        ctx: &TenantContext,
        credentials: Credentials,
    ) -> Result<Credentials, HandshakeError> {
        validate_credentials(&credentials)?;

        if credentials.primary_identity().as_ref() != Some(&ctx.identity) {
            warn!(peer = %ctx.identity, "Credentials update names a different party");
            return Err(HandshakeError::InvalidParameters(format!(
                "credentials must describe the authenticated party {}",
                ctx.identity
            )));
        }

        let peer = self
            .directory
            .find_by_identity(&ctx.identity)
            .await?
            .filter(|p| !p.is_revoked())
            .ok_or_else(|| HandshakeError::InvalidParameters("peer not found".into()))?;

        let negotiated = self
            .negotiator
            .negotiate(&credentials.url, &credentials.token)
            .await
            .inspect_err(|e| warn!(peer = %peer.identity, error = %e, "Negotiation failed"))?;

        let token_c = TokenCodec::generate_token();
        self.directory
            .commit_negotiated_credentials(
                peer.id,
                &token_c,
                negotiated.version,
                negotiated.endpoints,
                &credentials,
                None,
            )
            .await?;

        info!(peer = %peer.identity, version = %negotiated.version, "Peer credentials rotated");
        Ok(self.own_credentials(&token_c))
    }

    /// Revoke the calling peer. Revoking twice is not an error.
    pub async fn unregister(&self, ctx: &TenantContext) -> Result<(), HandshakeError> {
        if self.directory.revoke(&ctx.token).await? {
            info!(peer = %ctx.identity, "Peer unregistered");
        }
        Ok(())
    }
}
