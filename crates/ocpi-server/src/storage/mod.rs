//! Storage abstraction for the credentials plane
//!
//! One trait covers bootstrap tokens, peers with their endpoints, and the
//! physical tokens peers push to us. The in-memory backend is the default;
//! PostgreSQL is available behind the `postgres` feature for deployments
//! where registrations must survive restarts.
//!
//! Token secrets never reach a backend in clear text. Bootstrap tokens and
//! token C are stored as digests produced by `TokenCodec`.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ocpi_core::{
    BootstrapToken, Credentials, Endpoint, PartyIdentity, Peer, PeerEndpoint, PhysicalToken,
    TokenType, VersionNumber,
};
use std::fmt::Debug;
use uuid::Uuid;

/// Error type for storage operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The write would move a record out of a terminal state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A single-use record was taken by another writer first
    #[error("Already consumed: {0}")]
    Consumed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Bootstrap token to mark used as part of a registration commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapClaim {
    pub token_id: Uuid,
    pub used_by: String,
}

/// Everything written when a peer completes negotiation.
///
/// Backends apply it as one unit: status, token C digest, version,
/// remote credentials, the full endpoint set and the bootstrap claim
/// change together or not at all.
#[derive(Debug, Clone)]
pub struct RegistrationCommit {
    pub peer_id: Uuid,
    /// Credentials the peer sent; carries token B, url and roles
    pub credentials: Credentials,
    pub peer_token_digest: String,
    pub version: VersionNumber,
    pub endpoints: Vec<Endpoint>,
    /// Set on first registration, `None` on rotation
    pub bootstrap: Option<BootstrapClaim>,
}

/// Storage backend trait
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait OcpiStore: Send + Sync + Debug {
    // =========================================================================
    // Bootstrap Tokens
    // =========================================================================

    async fn insert_bootstrap_token(&self, token: BootstrapToken) -> Result<(), StorageError>;

    /// Look up a bootstrap token by the digest of its secret
    async fn find_bootstrap_token(
        &self,
        secret_digest: &str,
    ) -> Result<Option<BootstrapToken>, StorageError>;

    async fn get_bootstrap_token(&self, id: Uuid) -> Result<Option<BootstrapToken>, StorageError>;

    /// Set `used_at`/`used_by` only if the token is still unused.
    ///
    /// Returns false when the token is unknown or was already used.
    async fn mark_bootstrap_token_used(
        &self,
        id: Uuid,
        used_by: &str,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    async fn list_bootstrap_tokens(&self) -> Result<Vec<BootstrapToken>, StorageError>;

    /// Delete tokens whose expiry is at or before `now`. Returns the count.
    async fn delete_expired_bootstrap_tokens(&self, now: DateTime<Utc>)
        -> Result<u64, StorageError>;

    // =========================================================================
    // Peers
    // =========================================================================

    /// Create or reset the peer keyed by the credentials' first role.
    ///
    /// An existing peer goes back to PENDING with its token C digest cleared.
    /// A REVOKED peer is left untouched and `Conflict` is returned.
    async fn upsert_peer(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<Peer, StorageError>;

    /// Atomically promote a peer to REGISTERED and replace its endpoints.
    ///
    /// When the commit carries a bootstrap claim and that token is already
    /// used, nothing is written and `Consumed` is returned.
    async fn commit_registration(
        &self,
        commit: RegistrationCommit,
        now: DateTime<Utc>,
    ) -> Result<Peer, StorageError>;

    /// Peer whose token C digest matches. REVOKED peers are never returned.
    async fn find_peer_by_token_digest(&self, digest: &str) -> Result<Option<Peer>, StorageError>;

    async fn find_peer_by_identity(
        &self,
        identity: &PartyIdentity,
    ) -> Result<Option<Peer>, StorageError>;

    /// Move the peer holding this token C digest to REVOKED.
    ///
    /// Returns false when no live peer holds the digest.
    async fn revoke_peer_by_token_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    async fn list_peers(&self) -> Result<Vec<Peer>, StorageError>;

    async fn list_peer_endpoints(&self, peer_id: Uuid) -> Result<Vec<PeerEndpoint>, StorageError>;

    /// Delete a peer with its endpoints, whatever its status
    async fn delete_peer(&self, identity: &PartyIdentity) -> Result<bool, StorageError>;

    // =========================================================================
    // Physical Tokens
    // =========================================================================

    /// Insert or replace, keyed by owner, uid and type
    async fn put_physical_token(&self, token: PhysicalToken) -> Result<(), StorageError>;

    async fn get_physical_token(
        &self,
        owner: &PartyIdentity,
        uid: &str,
        token_type: TokenType,
    ) -> Result<Option<PhysicalToken>, StorageError>;

    /// Every token with this uid and type, across all owners, ordered by owner
    async fn find_physical_tokens(
        &self,
        uid: &str,
        token_type: TokenType,
    ) -> Result<Vec<PhysicalToken>, StorageError>;
}
