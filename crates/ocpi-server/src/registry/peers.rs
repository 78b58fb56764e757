//! Peer directory
//!
//! Remembers every party that has completed (or started) the credentials
//! handshake, keyed by `(country_code, party_id)`, and resolves inbound
//! bearer tokens to the peer they were issued to.

use chrono::Utc;
use ocpi_core::{
    Credentials, Endpoint, InterfaceRole, PartyIdentity, Peer, PeerEndpoint, PeerStatus,
    TokenCodec, VersionNumber,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{BootstrapClaim, OcpiStore, RegistrationCommit, StorageError};

#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
    #[error("peer {0} is revoked")]
    Revoked(PartyIdentity),

    #[error("credentials declare no role")]
    MissingRole,

    #[error("bootstrap token was used by another registration")]
    BootstrapConsumed,

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for DirectoryError {
    fn from(e: StorageError) -> Self {
        DirectoryError::Storage(e)
    }
}

pub struct PeerDirectory {
    store: Arc<dyn OcpiStore>,
    codec: TokenCodec,
}

impl PeerDirectory {
    pub fn new(store: Arc<dyn OcpiStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Create or reset the peer described by credentials it sent us.
    ///
    /// The peer lands in PENDING and any token C issued earlier stops working.
    pub async fn upsert_from_incoming_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Peer, DirectoryError> {
        let identity = credentials
            .primary_identity()
            .ok_or(DirectoryError::MissingRole)?;

        match self.store.upsert_peer(credentials, Utc::now()).await {
            Ok(peer) => Ok(peer),
            Err(StorageError::Conflict(_)) => {
                warn!(peer = %identity, "Refused credentials for revoked peer");
                Err(DirectoryError::Revoked(identity))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Promote a peer to REGISTERED after successful negotiation.
    ///
    /// `new_token` is the clear-text token C; only its digest is stored.
    /// Status, token, version, remote credentials, endpoints and the
    /// bootstrap claim (first registration only) change together.
    pub async fn commit_negotiated_credentials(
        &self,
        peer_id: Uuid,
        new_token: &str,
        version: VersionNumber,
        endpoints: Vec<Endpoint>,
        credentials: &Credentials,
        bootstrap: Option<BootstrapClaim>,
    ) -> Result<Peer, DirectoryError> {
        let commit = RegistrationCommit {
            peer_id,
            credentials: credentials.clone(),
            peer_token_digest: self.codec.digest(new_token),
            version,
            endpoints,
            bootstrap,
        };

        match self.store.commit_registration(commit, Utc::now()).await {
            Ok(peer) => {
                info!(peer = %peer.identity, version = %version, "Peer registered");
                Ok(peer)
            }
            Err(StorageError::Conflict(_)) => {
                let identity = credentials
                    .primary_identity()
                    .ok_or(DirectoryError::MissingRole)?;
                Err(DirectoryError::Revoked(identity))
            }
            Err(StorageError::Consumed(what)) => {
                warn!(peer_id = %peer_id, claim = %what, "Registration lost its bootstrap token");
                Err(DirectoryError::BootstrapConsumed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve an inbound bearer token to its live peer.
    ///
    /// Only REGISTERED peers authenticate.
    pub async fn find_by_bearer_token(&self, token: &str) -> Result<Option<Peer>, StorageError> {
        let digest = self.codec.digest(token);
        let peer = self.store.find_peer_by_token_digest(&digest).await?;

        Ok(peer.filter(|p| {
            p.status == PeerStatus::Registered
                && p.peer_token_digest
                    .as_deref()
                    .is_some_and(|stored| self.codec.verify(token, stored))
        }))
    }

    pub async fn find_by_identity(
        &self,
        identity: &PartyIdentity,
    ) -> Result<Option<Peer>, StorageError> {
        self.store.find_peer_by_identity(identity).await
    }

    /// Revoke the peer holding this token C. Returns false when none does.
    pub async fn revoke(&self, token: &str) -> Result<bool, StorageError> {
        let digest = self.codec.digest(token);
        self.store.revoke_peer_by_token_digest(&digest, Utc::now()).await
    }

    pub async fn endpoints(&self, peer_id: Uuid) -> Result<Vec<PeerEndpoint>, StorageError> {
        self.store.list_peer_endpoints(peer_id).await
    }

    /// First endpoint of `module` the peer exposes in `role`.
    ///
    /// Endpoints advertised without a role (pre-2.2 peers) also match.
    pub async fn endpoint_for(
        &self,
        peer_id: Uuid,
        module: &str,
        role: InterfaceRole,
    ) -> Result<Option<PeerEndpoint>, StorageError> {
        let endpoints = self.endpoints(peer_id).await?;
        Ok(endpoints
            .into_iter()
            .filter(|e| e.identifier == module)
            .find(|e| e.role.map_or(true, |r| r == role)))
    }

    pub async fn list(&self) -> Result<Vec<Peer>, StorageError> {
        self.store.list_peers().await
    }

    /// Forget a peer entirely, so the identity can register again
    pub async fn remove(&self, identity: &PartyIdentity) -> Result<bool, StorageError> {
        self.store.delete_peer(identity).await
    }
}
