//! Shared fixtures: an in-memory server wired to mock peers

#![allow(dead_code)]

use chrono::Utc;
use ocpi_bridge::{MockPeerDiscovery, MockRealtimeAuthorization};
use ocpi_core::{
    AllowedType, Credentials, CredentialsRole, Endpoint, InterfaceRole, PhysicalToken, Role,
    TokenFields, TokenType, WhitelistType,
};
use ocpi_server::{AppState, MemoryStore, ServerConfig};
use std::sync::Arc;

pub const PEER_VERSIONS_URL: &str = "https://emsp.example.com/ocpi/versions";
pub const PEER_TOKENS_URL: &str = "https://emsp.example.com/ocpi/2.2.1/tokens";
pub const OLD_PEER_VERSIONS_URL: &str = "https://legacy.example.com/ocpi/versions";
pub const DOWN_PEER_VERSIONS_URL: &str = "https://down.example.com/ocpi/versions";
pub const ADMIN_KEY: &str = "test-admin-key";

pub struct TestPlane {
    pub state: Arc<AppState>,
    pub discovery: Arc<MockPeerDiscovery>,
    pub realtime: Arc<MockRealtimeAuthorization>,
}

pub fn config() -> ServerConfig {
    ServerConfig {
        public_url: "https://cpo.example.com".into(),
        country_code: "DE".into(),
        party_id: "CPO".into(),
        admin_key: Some(ADMIN_KEY.into()),
        ..ServerConfig::default()
    }
}

pub fn discovery() -> MockPeerDiscovery {
    MockPeerDiscovery::advertising(
        PEER_VERSIONS_URL,
        "2.2.1",
        vec![
            Endpoint {
                identifier: "credentials".into(),
                role: Some(InterfaceRole::Receiver),
                url: "https://emsp.example.com/ocpi/2.2.1/credentials".into(),
            },
            Endpoint {
                identifier: "tokens".into(),
                role: Some(InterfaceRole::Sender),
                url: PEER_TOKENS_URL.into(),
            },
        ],
    )
    .with_versions(
        OLD_PEER_VERSIONS_URL,
        vec![ocpi_core::Version {
            version: "2.1.1".into(),
            url: "https://legacy.example.com/ocpi/2.1.1".into(),
        }],
    )
}

pub fn plane_with(realtime: MockRealtimeAuthorization) -> TestPlane {
    let discovery = Arc::new(discovery());
    let realtime = Arc::new(realtime);
    let state = Arc::new(AppState::new(
        config(),
        Arc::new(MemoryStore::new()),
        discovery.clone(),
        realtime.clone(),
    ));
    TestPlane {
        state,
        discovery,
        realtime,
    }
}

pub fn plane() -> TestPlane {
    plane_with(MockRealtimeAuthorization::responding(AllowedType::Allowed))
}

pub fn credentials(token_b: &str, url: &str, party_id: &str) -> Credentials {
    Credentials {
        token: token_b.into(),
        url: url.into(),
        roles: vec![CredentialsRole {
            role: Role::Emsp,
            business_details: None,
            party_id: party_id.into(),
            country_code: "NL".into(),
        }],
    }
}

pub fn emsp_credentials(token_b: &str) -> Credentials {
    credentials(token_b, PEER_VERSIONS_URL, "TST")
}

pub fn token(party_id: &str, uid: &str, valid: bool, whitelist: WhitelistType) -> PhysicalToken {
    PhysicalToken::new(TokenFields {
        country_code: "NL".into(),
        party_id: party_id.into(),
        uid: uid.into(),
        token_type: TokenType::Rfid,
        contract_id: format!("NL-{}-C{}", party_id, uid),
        visual_number: None,
        issuer: "Test eMSP".into(),
        group_id: None,
        valid,
        whitelist,
        language: Some("en".into()),
        last_updated: Utc::now(),
    })
    .expect("valid token fixture")
}

impl TestPlane {
    /// Issue a bootstrap token and register the NL-TST peer; returns token C
    pub async fn register_peer(&self, token_b: &str) -> String {
        let issued = self
            .state
            .bootstrap
            .issue(Some("fixture".into()), None)
            .await
            .expect("issue bootstrap token");
        self.state
            .handshake
            .register(&issued.secret, emsp_credentials(token_b))
            .await
            .expect("registration")
            .token
    }
}
