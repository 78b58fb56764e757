//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ocpi_core::{
    BootstrapToken, Credentials, PartyIdentity, Peer, PeerEndpoint, PhysicalToken, TokenType,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use uuid::Uuid;

use super::{OcpiStore, RegistrationCommit, StorageError};

type TokenKey = (PartyIdentity, String, TokenType);

/// Peers, their lookup indexes and endpoints share one lock so a
/// registration commit is never observed half-applied.
#[derive(Debug, Default)]
struct PeerTables {
    peers: HashMap<Uuid, Peer>,
    by_identity: HashMap<PartyIdentity, Uuid>,
    by_token_digest: HashMap<String, Uuid>,
    endpoints: HashMap<Uuid, Vec<PeerEndpoint>>,
}

/// In-memory store implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    bootstrap: RwLock<HashMap<Uuid, BootstrapToken>>,
    peers: RwLock<PeerTables>,
    tokens: RwLock<HashMap<TokenKey, PhysicalToken>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read()
        .map_err(|_| StorageError::Database("lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write()
        .map_err(|_| StorageError::Database("lock poisoned".into()))
}

fn token_key(owner: &PartyIdentity, uid: &str, token_type: TokenType) -> TokenKey {
    (owner.clone(), uid.to_string(), token_type)
}

#[async_trait]
impl OcpiStore for MemoryStore {
    // =========================================================================
    // Bootstrap Tokens
    // =========================================================================

    async fn insert_bootstrap_token(&self, token: BootstrapToken) -> Result<(), StorageError> {
        let mut tokens = write(&self.bootstrap)?;
        if tokens.values().any(|t| t.secret_digest == token.secret_digest) {
            return Err(StorageError::AlreadyExists("bootstrap token secret".into()));
        }
        info!(id = %token.id, "Stored bootstrap token");
        tokens.insert(token.id, token);
        Ok(())
    }

    async fn find_bootstrap_token(
        &self,
        secret_digest: &str,
    ) -> Result<Option<BootstrapToken>, StorageError> {
        let tokens = read(&self.bootstrap)?;
        Ok(tokens
            .values()
            .find(|t| t.secret_digest == secret_digest)
            .cloned())
    }

    async fn get_bootstrap_token(&self, id: Uuid) -> Result<Option<BootstrapToken>, StorageError> {
        let tokens = read(&self.bootstrap)?;
        Ok(tokens.get(&id).cloned())
    }

    async fn mark_bootstrap_token_used(
        &self,
        id: Uuid,
        used_by: &str,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut tokens = write(&self.bootstrap)?;
        let Some(consumed) = tokens.get(&id).and_then(|t| t.consume(used_by, used_at)) else {
            return Ok(false);
        };
        tokens.insert(id, consumed);
        Ok(true)
    }

    async fn list_bootstrap_tokens(&self) -> Result<Vec<BootstrapToken>, StorageError> {
        let tokens = read(&self.bootstrap)?;
        let mut list: Vec<_> = tokens.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn delete_expired_bootstrap_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut tokens = write(&self.bootstrap)?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired(now));
        Ok((before - tokens.len()) as u64)
    }

    // =========================================================================
    // Peers
    // =========================================================================

    async fn upsert_peer(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<Peer, StorageError> {
        let identity = credentials
            .primary_identity()
            .ok_or_else(|| StorageError::Serialization("credentials declare no role".into()))?;

        let mut tables = write(&self.peers)?;
        let existing = tables
            .by_identity
            .get(&identity)
            .and_then(|id| tables.peers.get(id))
            .cloned();

        let peer = match existing {
            Some(peer) if peer.is_revoked() => {
                return Err(StorageError::Conflict(format!("peer {} is revoked", identity)));
            }
            Some(peer) => {
                if let Some(digest) = &peer.peer_token_digest {
                    tables.by_token_digest.remove(digest);
                }
                peer.rotate_credentials(credentials, now)
            }
            None => Peer::pending(credentials, now)
                .ok_or_else(|| StorageError::Serialization("credentials declare no role".into()))?,
        };

        info!(peer = %peer.identity, id = %peer.id, "Upserted peer as PENDING");
        tables.by_identity.insert(peer.identity.clone(), peer.id);
        tables.peers.insert(peer.id, peer.clone());
        Ok(peer)
    }

    async fn commit_registration(
        &self,
        commit: RegistrationCommit,
        now: DateTime<Utc>,
    ) -> Result<Peer, StorageError> {
        let mut tables = write(&self.peers)?;
        let current = tables
            .peers
            .get(&commit.peer_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(commit.peer_id.to_string()))?;

        if current.is_revoked() {
            return Err(StorageError::Conflict(format!(
                "peer {} is revoked",
                current.identity
            )));
        }
        if tables.by_token_digest.contains_key(&commit.peer_token_digest) {
            return Err(StorageError::AlreadyExists("peer token digest".into()));
        }

        // Lock order: peers, then bootstrap
        let mut bootstrap = write(&self.bootstrap)?;
        let consumed = match &commit.bootstrap {
            Some(claim) => {
                let Some(consumed) = bootstrap
                    .get(&claim.token_id)
                    .and_then(|t| t.consume(&claim.used_by, now))
                else {
                    return Err(StorageError::Consumed(format!(
                        "bootstrap token {}",
                        claim.token_id
                    )));
                };
                Some(consumed)
            }
            None => None,
        };

        let registered = current.register(
            &commit.credentials,
            commit.peer_token_digest.clone(),
            commit.version,
            now,
        );

        if let Some(old) = &current.peer_token_digest {
            tables.by_token_digest.remove(old);
        }
        tables
            .by_token_digest
            .insert(commit.peer_token_digest, registered.id);
        tables.endpoints.insert(
            registered.id,
            commit
                .endpoints
                .iter()
                .map(|e| PeerEndpoint::from_endpoint(registered.id, e))
                .collect(),
        );
        tables.peers.insert(registered.id, registered.clone());
        if let Some(consumed) = consumed {
            bootstrap.insert(consumed.id, consumed);
        }

        info!(
            peer = %registered.identity,
            version = ?registered.version,
            endpoints = commit.endpoints.len(),
            "Committed peer registration"
        );
        Ok(registered)
    }

    async fn find_peer_by_token_digest(&self, digest: &str) -> Result<Option<Peer>, StorageError> {
        let tables = read(&self.peers)?;
        Ok(tables
            .by_token_digest
            .get(digest)
            .and_then(|id| tables.peers.get(id))
            .filter(|p| !p.is_revoked())
            .cloned())
    }

    async fn find_peer_by_identity(
        &self,
        identity: &PartyIdentity,
    ) -> Result<Option<Peer>, StorageError> {
        let tables = read(&self.peers)?;
        Ok(tables
            .by_identity
            .get(identity)
            .and_then(|id| tables.peers.get(id))
            .cloned())
    }

    async fn revoke_peer_by_token_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut tables = write(&self.peers)?;
        let Some(id) = tables.by_token_digest.remove(digest) else {
            return Ok(false);
        };
        let Some(peer) = tables.peers.get(&id).filter(|p| !p.is_revoked()).cloned() else {
            return Ok(false);
        };
        let revoked = peer.revoke(now);
        info!(peer = %revoked.identity, "Revoked peer");
        tables.peers.insert(id, revoked);
        Ok(true)
    }

    async fn list_peers(&self) -> Result<Vec<Peer>, StorageError> {
        let tables = read(&self.peers)?;
        let mut peers: Vec<_> = tables.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(peers)
    }

    async fn list_peer_endpoints(&self, peer_id: Uuid) -> Result<Vec<PeerEndpoint>, StorageError> {
        let tables = read(&self.peers)?;
        Ok(tables.endpoints.get(&peer_id).cloned().unwrap_or_default())
    }

    async fn delete_peer(&self, identity: &PartyIdentity) -> Result<bool, StorageError> {
        let mut tables = write(&self.peers)?;
        let Some(id) = tables.by_identity.remove(identity) else {
            return Ok(false);
        };
        if let Some(peer) = tables.peers.remove(&id) {
            if let Some(digest) = &peer.peer_token_digest {
                tables.by_token_digest.remove(digest);
            }
        }
        tables.endpoints.remove(&id);
        info!(peer = %identity, "Deleted peer");
        Ok(true)
    }

    // =========================================================================
    // Physical Tokens
    // =========================================================================

    async fn put_physical_token(&self, token: PhysicalToken) -> Result<(), StorageError> {
        let mut tokens = write(&self.tokens)?;
        let key = token_key(&token.owner(), token.uid(), token.token_type());
        tokens.insert(key, token);
        Ok(())
    }

    async fn get_physical_token(
        &self,
        owner: &PartyIdentity,
        uid: &str,
        token_type: TokenType,
    ) -> Result<Option<PhysicalToken>, StorageError> {
        let tokens = read(&self.tokens)?;
        Ok(tokens.get(&token_key(owner, uid, token_type)).cloned())
    }

    async fn find_physical_tokens(
        &self,
        uid: &str,
        token_type: TokenType,
    ) -> Result<Vec<PhysicalToken>, StorageError> {
        let tokens = read(&self.tokens)?;
        let mut found: Vec<_> = tokens
            .values()
            .filter(|t| t.uid() == uid && t.token_type() == token_type)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.owner());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BootstrapClaim;
    use chrono::Duration;
    use ocpi_core::{
        CredentialsRole, Endpoint, InterfaceRole, PeerStatus, Role, TokenFields, VersionNumber,
        WhitelistType,
    };

    fn credentials(token: &str, party_id: &str) -> Credentials {
        Credentials {
            token: token.into(),
            url: "https://emsp.example.com/ocpi/versions".into(),
            roles: vec![CredentialsRole {
                role: Role::Emsp,
                business_details: None,
                party_id: party_id.into(),
                country_code: "NL".into(),
            }],
        }
    }

    fn bootstrap(digest: &str, expires_at: Option<DateTime<Utc>>) -> BootstrapToken {
        BootstrapToken {
            id: Uuid::new_v4(),
            secret_digest: digest.into(),
            description: None,
            expires_at,
            used_at: None,
            used_by: None,
            created_at: Utc::now(),
        }
    }

    fn physical(party_id: &str, uid: &str) -> PhysicalToken {
        PhysicalToken::new(TokenFields {
            country_code: "NL".into(),
            party_id: party_id.into(),
            uid: uid.into(),
            token_type: TokenType::Rfid,
            contract_id: format!("NL-{}-C1", party_id),
            visual_number: None,
            issuer: "Test eMSP".into(),
            group_id: None,
            valid: true,
            whitelist: WhitelistType::Always,
            language: None,
            last_updated: Utc::now(),
        })
        .unwrap()
    }

    fn commit(peer_id: Uuid, digest: &str) -> RegistrationCommit {
        RegistrationCommit {
            peer_id,
            credentials: credentials("token-b2", "TST"),
            peer_token_digest: digest.into(),
            version: VersionNumber::V2_2_1,
            endpoints: vec![Endpoint {
                identifier: "tokens".into(),
                role: Some(InterfaceRole::Sender),
                url: "https://emsp.example.com/ocpi/2.2.1/tokens".into(),
            }],
            bootstrap: None,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_mark_used_once() {
        let store = MemoryStore::new();
        let token = bootstrap("digest-a", None);
        let id = token.id;
        store.insert_bootstrap_token(token).await.unwrap();

        assert!(store.mark_bootstrap_token_used(id, "NL-TST", Utc::now()).await.unwrap());
        assert!(!store.mark_bootstrap_token_used(id, "NL-XYZ", Utc::now()).await.unwrap());

        let stored = store.find_bootstrap_token("digest-a").await.unwrap().unwrap();
        assert_eq!(stored.used_by.as_deref(), Some("NL-TST"));
    }

    #[tokio::test]
    async fn test_duplicate_bootstrap_digest_rejected() {
        let store = MemoryStore::new();
        store.insert_bootstrap_token(bootstrap("same", None)).await.unwrap();
        let result = store.insert_bootstrap_token(bootstrap("same", None)).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_delete_expired_bootstrap_tokens() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_bootstrap_token(bootstrap("old", Some(now - Duration::days(1))))
            .await
            .unwrap();
        store
            .insert_bootstrap_token(bootstrap("fresh", Some(now + Duration::days(1))))
            .await
            .unwrap();
        store.insert_bootstrap_token(bootstrap("forever", None)).await.unwrap();

        assert_eq!(store.delete_expired_bootstrap_tokens(now).await.unwrap(), 1);
        assert_eq!(store.list_bootstrap_tokens().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_commit_registration_and_lookup() {
        let store = MemoryStore::new();
        let peer = store.upsert_peer(&credentials("token-b", "TST"), Utc::now()).await.unwrap();
        assert_eq!(peer.status, PeerStatus::Pending);

        let registered = store.commit_registration(commit(peer.id, "digest-c"), Utc::now()).await.unwrap();
        assert_eq!(registered.status, PeerStatus::Registered);
        assert_eq!(registered.our_token_for_peer, "token-b2");

        let found = store.find_peer_by_token_digest("digest-c").await.unwrap().unwrap();
        assert_eq!(found.id, peer.id);
        assert_eq!(store.list_peer_endpoints(peer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_clears_previous_token() {
        let store = MemoryStore::new();
        let peer = store.upsert_peer(&credentials("token-b", "TST"), Utc::now()).await.unwrap();
        store.commit_registration(commit(peer.id, "digest-c"), Utc::now()).await.unwrap();

        let reset = store.upsert_peer(&credentials("token-b3", "TST"), Utc::now()).await.unwrap();
        assert_eq!(reset.id, peer.id);
        assert_eq!(reset.status, PeerStatus::Pending);
        assert!(store.find_peer_by_token_digest("digest-c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoked_peer_is_terminal() {
        let store = MemoryStore::new();
        let peer = store.upsert_peer(&credentials("token-b", "TST"), Utc::now()).await.unwrap();
        store.commit_registration(commit(peer.id, "digest-c"), Utc::now()).await.unwrap();

        assert!(store.revoke_peer_by_token_digest("digest-c", Utc::now()).await.unwrap());
        assert!(!store.revoke_peer_by_token_digest("digest-c", Utc::now()).await.unwrap());
        assert!(store.find_peer_by_token_digest("digest-c").await.unwrap().is_none());

        let upsert = store.upsert_peer(&credentials("token-b4", "TST"), Utc::now()).await;
        assert!(matches!(upsert, Err(StorageError::Conflict(_))));
        let again = store.commit_registration(commit(peer.id, "digest-d"), Utc::now()).await;
        assert!(matches!(again, Err(StorageError::Conflict(_))));

        assert!(store.delete_peer(&PartyIdentity::new("NL", "TST")).await.unwrap());
        assert!(store.upsert_peer(&credentials("token-b4", "TST"), Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_commit_consumes_bootstrap_claim() {
        let store = MemoryStore::new();
        let token = bootstrap("digest-a", None);
        let token_id = token.id;
        store.insert_bootstrap_token(token).await.unwrap();
        let peer = store.upsert_peer(&credentials("token-b", "TST"), Utc::now()).await.unwrap();

        let claimed = RegistrationCommit {
            bootstrap: Some(BootstrapClaim {
                token_id,
                used_by: "NL-TST".into(),
            }),
            ..commit(peer.id, "digest-c")
        };
        store.commit_registration(claimed, Utc::now()).await.unwrap();

        let stored = store.get_bootstrap_token(token_id).await.unwrap().unwrap();
        assert_eq!(stored.used_by.as_deref(), Some("NL-TST"));
    }

    #[tokio::test]
    async fn test_commit_with_used_bootstrap_writes_nothing() {
        let store = MemoryStore::new();
        let token = bootstrap("digest-a", None);
        let token_id = token.id;
        store.insert_bootstrap_token(token).await.unwrap();
        assert!(store.mark_bootstrap_token_used(token_id, "NL-XYZ", Utc::now()).await.unwrap());

        let peer = store.upsert_peer(&credentials("token-b", "TST"), Utc::now()).await.unwrap();
        let claimed = RegistrationCommit {
            bootstrap: Some(BootstrapClaim {
                token_id,
                used_by: "NL-TST".into(),
            }),
            ..commit(peer.id, "digest-c")
        };
        let result = store.commit_registration(claimed, Utc::now()).await;
        assert!(matches!(result, Err(StorageError::Consumed(_))));

        let after = store.find_peer_by_identity(&peer.identity).await.unwrap().unwrap();
        assert_eq!(after.status, PeerStatus::Pending);
        assert!(store.find_peer_by_token_digest("digest-c").await.unwrap().is_none());
        assert!(store.list_peer_endpoints(peer.id).await.unwrap().is_empty());
        let stored = store.get_bootstrap_token(token_id).await.unwrap().unwrap();
        assert_eq!(stored.used_by.as_deref(), Some("NL-XYZ"));
    }

    #[tokio::test]
    async fn test_find_physical_tokens_across_owners() {
        let store = MemoryStore::new();
        for party_id in ["ZZZ", "AAA"] {
            store.put_physical_token(physical(party_id, "SHARED1")).await.unwrap();
        }
        store.put_physical_token(physical("AAA", "OTHER")).await.unwrap();

        let found = store.find_physical_tokens("SHARED1", TokenType::Rfid).await.unwrap();
        let owners: Vec<_> = found.iter().map(|t| t.owner()).collect();
        assert_eq!(
            owners,
            vec![PartyIdentity::new("NL", "AAA"), PartyIdentity::new("NL", "ZZZ")]
        );
        assert!(store.find_physical_tokens("SHARED1", TokenType::AppUser).await.unwrap().is_empty());
    }
}
