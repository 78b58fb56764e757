//! Credentials handshake tests
//!
//! Registration, rotation and revocation through the service layer, with
//! peers served by the mock discovery client.

mod common;

use async_trait::async_trait;
use chrono::Utc;
use common::*;
use ocpi_bridge::{MockPeerDiscovery, MockRealtimeAuthorization, PeerDiscovery};
use ocpi_core::{
    AllowedType, PartyIdentity, PeerStatus, UnusableReason, Version, VersionDetails, VersionNumber,
};
use ocpi_server::core::{HandshakeError, TenantContext};
use ocpi_server::{AppState, MemoryStore, OcpiStore};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Discovery that lets another party use token A while versions are fetched
struct ContendedDiscovery {
    inner: MockPeerDiscovery,
    store: Arc<MemoryStore>,
    bootstrap_id: OnceLock<Uuid>,
}

#[async_trait]
impl PeerDiscovery for ContendedDiscovery {
    async fn fetch_versions(&self, url: &str, token: &str) -> ocpi_bridge::Result<Vec<Version>> {
        if let Some(id) = self.bootstrap_id.get() {
            self.store
                .mark_bootstrap_token_used(*id, "NL-XYZ", Utc::now())
                .await
                .unwrap();
        }
        self.inner.fetch_versions(url, token).await
    }

    async fn fetch_version_details(&self, url: &str, token: &str) -> ocpi_bridge::Result<VersionDetails> {
        self.inner.fetch_version_details(url, token).await
    }
}

async fn context(plane: &TestPlane, token_c: &str) -> TenantContext {
    let peer = plane
        .state
        .directory
        .find_by_bearer_token(token_c)
        .await
        .unwrap()
        .expect("token C authenticates");
    TenantContext {
        peer_id: peer.id,
        identity: peer.identity,
        token: token_c.to_string(),
    }
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn registration_issues_token_c_and_consumes_bootstrap() {
    let plane = plane();
    let issued = plane.state.bootstrap.issue(None, Some(30)).await.unwrap();

    let ours = plane
        .state
        .handshake
        .register(&issued.secret, emsp_credentials("token-b"))
        .await
        .unwrap();

    assert_eq!(ours.token.len(), 43);
    assert_ne!(ours.token, issued.secret);
    assert_eq!(ours.url, "https://cpo.example.com/ocpi/versions");
    assert_eq!(ours.roles[0].party_id, "CPO");

    let peer = plane
        .state
        .directory
        .find_by_bearer_token(&ours.token)
        .await
        .unwrap()
        .expect("peer authenticates with token C");
    assert_eq!(peer.identity, PartyIdentity::new("NL", "TST"));
    assert_eq!(peer.status, PeerStatus::Registered);
    assert_eq!(peer.version, Some(VersionNumber::V2_2_1));
    assert_eq!(peer.our_token_for_peer, "token-b");

    let endpoints = plane.state.directory.endpoints(peer.id).await.unwrap();
    assert_eq!(endpoints.len(), 2);

    // Discovery calls were authenticated with token B
    assert!(plane.discovery.calls().iter().all(|(_, token)| token == "token-b"));

    let usability = plane.state.bootstrap.check_usable(&issued.secret).await.unwrap();
    assert_eq!(usability.reason, Some(UnusableReason::AlreadyUsed));
    let listed = plane.state.bootstrap.list().await.unwrap();
    assert_eq!(listed[0].used_by.as_deref(), Some("NL-TST"));
}

#[tokio::test]
async fn bootstrap_token_cannot_be_reused() {
    let plane = plane();
    let issued = plane.state.bootstrap.issue(None, None).await.unwrap();
    plane
        .state
        .handshake
        .register(&issued.secret, emsp_credentials("token-b"))
        .await
        .unwrap();

    let second = plane
        .state
        .handshake
        .register(&issued.secret, credentials("token-x", PEER_VERSIONS_URL, "XYZ"))
        .await;
    assert!(matches!(
        second,
        Err(HandshakeError::Bootstrap(UnusableReason::AlreadyUsed))
    ));
    assert!(plane
        .state
        .directory
        .find_by_identity(&PartyIdentity::new("NL", "XYZ"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unknown_bootstrap_token_rejected() {
    let plane = plane();
    let result = plane
        .state
        .handshake
        .register("not-a-real-token", emsp_credentials("token-b"))
        .await;
    assert!(matches!(
        result,
        Err(HandshakeError::Bootstrap(UnusableReason::NotFound))
    ));
    assert!(plane.discovery.calls().is_empty());
}

#[tokio::test]
async fn no_common_version_leaves_peer_unregistered() {
    let plane = plane();
    let issued = plane.state.bootstrap.issue(None, None).await.unwrap();

    let result = plane
        .state
        .handshake
        .register(
            &issued.secret,
            credentials("token-b", OLD_PEER_VERSIONS_URL, "OLD"),
        )
        .await;

    match result {
        Err(HandshakeError::NoMatchingVersion { offered }) => {
            assert_eq!(offered, vec!["2.1.1".to_string()])
        }
        other => panic!("expected NoMatchingVersion, got {:?}", other),
    }

    let peer = plane
        .state
        .directory
        .find_by_identity(&PartyIdentity::new("NL", "OLD"))
        .await
        .unwrap()
        .expect("peer recorded as pending");
    assert_eq!(peer.status, PeerStatus::Pending);
    assert!(peer.peer_token_digest.is_none());

    // Token A survives a failed handshake so the caller can retry
    let usability = plane.state.bootstrap.check_usable(&issued.secret).await.unwrap();
    assert!(usability.usable);
}

#[tokio::test]
async fn unreachable_peer_reported() {
    let plane = plane();
    let issued = plane.state.bootstrap.issue(None, None).await.unwrap();

    let result = plane
        .state
        .handshake
        .register(
            &issued.secret,
            credentials("token-b", DOWN_PEER_VERSIONS_URL, "DWN"),
        )
        .await;

    assert!(matches!(result, Err(HandshakeError::UnreachablePeer(_))));
    assert!(plane.state.bootstrap.check_usable(&issued.secret).await.unwrap().usable);
}

#[tokio::test]
async fn bootstrap_used_during_negotiation_aborts_registration() {
    let store = Arc::new(MemoryStore::new());
    let discovery = Arc::new(ContendedDiscovery {
        inner: discovery(),
        store: store.clone(),
        bootstrap_id: OnceLock::new(),
    });
    let state = AppState::new(
        config(),
        store.clone(),
        discovery.clone(),
        Arc::new(MockRealtimeAuthorization::responding(AllowedType::Allowed)),
    );
    let issued = state.bootstrap.issue(None, None).await.unwrap();
    discovery.bootstrap_id.set(issued.token.id).unwrap();

    let result = state
        .handshake
        .register(&issued.secret, emsp_credentials("token-b"))
        .await;
    assert!(matches!(
        result,
        Err(HandshakeError::Bootstrap(UnusableReason::AlreadyUsed))
    ));

    let peer = state
        .directory
        .find_by_identity(&PartyIdentity::new("NL", "TST"))
        .await
        .unwrap()
        .expect("peer recorded as pending");
    assert_eq!(peer.status, PeerStatus::Pending);
    assert!(peer.peer_token_digest.is_none());
    assert!(state.directory.endpoints(peer.id).await.unwrap().is_empty());

    let token = store.get_bootstrap_token(issued.token.id).await.unwrap().unwrap();
    assert_eq!(token.used_by.as_deref(), Some("NL-XYZ"));
}

#[tokio::test]
async fn invalid_credentials_rejected_before_negotiation() {
    let plane = plane();
    let issued = plane.state.bootstrap.issue(None, None).await.unwrap();

    let mut creds = emsp_credentials("token-b");
    creds.url = "ftp://emsp.example.com/versions".into();
    let result = plane.state.handshake.register(&issued.secret, creds).await;
    assert!(matches!(result, Err(HandshakeError::InvalidParameters(_))));

    let mut creds = emsp_credentials("token-b");
    creds.roles.clear();
    let result = plane.state.handshake.register(&issued.secret, creds).await;
    assert!(matches!(result, Err(HandshakeError::InvalidParameters(_))));

    assert!(plane.discovery.calls().is_empty());
}

#[tokio::test]
async fn reregistration_replaces_token_c() {
    let plane = plane();
    let first = plane.register_peer("token-b").await;
    let second = plane.register_peer("token-b2").await;

    assert_ne!(first, second);
    assert!(plane.state.directory.find_by_bearer_token(&first).await.unwrap().is_none());
    let peer = plane
        .state
        .directory
        .find_by_bearer_token(&second)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(peer.our_token_for_peer, "token-b2");
    assert_eq!(plane.state.directory.list().await.unwrap().len(), 1);
}

// =============================================================================
// Rotation
// =============================================================================

#[tokio::test]
async fn rotation_issues_new_token_c() {
    let plane = plane();
    let token_c = plane.register_peer("token-b").await;
    let ctx = context(&plane, &token_c).await;

    let ours = plane
        .state
        .handshake
        .rotate(&ctx, emsp_credentials("token-b-rotated"))
        .await
        .unwrap();

    assert_ne!(ours.token, token_c);
    assert!(plane.state.directory.find_by_bearer_token(&token_c).await.unwrap().is_none());
    let peer = plane
        .state
        .directory
        .find_by_bearer_token(&ours.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(peer.id, ctx.peer_id);
    assert_eq!(peer.our_token_for_peer, "token-b-rotated");
}

#[tokio::test]
async fn rotation_must_describe_the_caller() {
    let plane = plane();
    let token_c = plane.register_peer("token-b").await;
    let ctx = context(&plane, &token_c).await;

    let result = plane
        .state
        .handshake
        .rotate(&ctx, credentials("token-b2", PEER_VERSIONS_URL, "OTH"))
        .await;
    assert!(matches!(result, Err(HandshakeError::InvalidParameters(_))));

    // Old token C still works after the refused rotation
    assert!(plane.state.directory.find_by_bearer_token(&token_c).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_rotation_keeps_existing_registration() {
    let plane = plane();
    let token_c = plane.register_peer("token-b").await;
    let ctx = context(&plane, &token_c).await;

    let result = plane
        .state
        .handshake
        .rotate(&ctx, credentials("token-b2", DOWN_PEER_VERSIONS_URL, "TST"))
        .await;
    assert!(matches!(result, Err(HandshakeError::UnreachablePeer(_))));

    let peer = plane
        .state
        .directory
        .find_by_bearer_token(&token_c)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(peer.our_token_for_peer, "token-b");
    assert_eq!(peer.url, PEER_VERSIONS_URL);
}

// =============================================================================
// Revocation
// =============================================================================

#[tokio::test]
async fn unregister_revokes_for_good() {
    let plane = plane();
    let token_c = plane.register_peer("token-b").await;
    let ctx = context(&plane, &token_c).await;

    plane.state.handshake.unregister(&ctx).await.unwrap();
    assert!(plane.state.directory.find_by_bearer_token(&token_c).await.unwrap().is_none());

    // Second DELETE is harmless
    plane.state.handshake.unregister(&ctx).await.unwrap();

    // A fresh bootstrap token does not resurrect the peer
    let issued = plane.state.bootstrap.issue(None, None).await.unwrap();
    let result = plane
        .state
        .handshake
        .register(&issued.secret, emsp_credentials("token-b3"))
        .await;
    assert!(matches!(result, Err(HandshakeError::PeerRevoked(_))));
    assert!(plane.state.bootstrap.check_usable(&issued.secret).await.unwrap().usable);

    let peer = plane
        .state
        .directory
        .find_by_identity(&PartyIdentity::new("NL", "TST"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(peer.status, PeerStatus::Revoked);
}

#[tokio::test]
async fn removed_peer_can_register_again() {
    let plane = plane();
    let token_c = plane.register_peer("token-b").await;
    let ctx = context(&plane, &token_c).await;
    plane.state.handshake.unregister(&ctx).await.unwrap();

    assert!(plane
        .state
        .directory
        .remove(&PartyIdentity::new("NL", "TST"))
        .await
        .unwrap());

    let fresh = plane.register_peer("token-b4").await;
    assert!(plane.state.directory.find_by_bearer_token(&fresh).await.unwrap().is_some());
}
