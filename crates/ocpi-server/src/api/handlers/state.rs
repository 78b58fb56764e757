//! Shared application state

use ocpi_bridge::{PeerDiscovery, RealtimeAuthorization, VersionNegotiator};
use ocpi_core::{TokenCodec, TokenType};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::handshake::OwnCredentials;
use crate::core::{CredentialsHandshake, PeerTokenConfirmation, TokenAuthorizationEngine};
use crate::registry::{BootstrapTokenStore, PeerDirectory};
use crate::storage::OcpiStore;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn OcpiStore>,
    pub codec: TokenCodec,
    /// Digest of the admin key, when admin routes are enabled
    pub admin_key_digest: Option<String>,
    pub bootstrap: Arc<BootstrapTokenStore>,
    pub directory: Arc<PeerDirectory>,
    pub handshake: CredentialsHandshake,
    pub authorization: TokenAuthorizationEngine,
}

impl AppState {
    /// Wire every service over `store`.
    ///
    /// `discovery` and `realtime` are the outbound clients used to talk to
    /// peers; production passes `PeerClient`, tests pass mocks.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn OcpiStore>,
        discovery: Arc<dyn PeerDiscovery>,
        realtime: Arc<dyn RealtimeAuthorization>,
    ) -> Self {
        let codec = config.token_codec();
        let bootstrap = Arc::new(BootstrapTokenStore::new(store.clone(), codec.clone()));
        let directory = Arc::new(PeerDirectory::new(store.clone(), codec.clone()));
        let negotiator = Arc::new(VersionNegotiator::new(discovery));

        let handshake = CredentialsHandshake::new(
            bootstrap.clone(),
            directory.clone(),
            negotiator,
            OwnCredentials {
                url: config.versions_url(),
                roles: config.own_roles(),
            },
        );
        let authorization = TokenAuthorizationEngine::new(
            store.clone(),
            Arc::new(PeerTokenConfirmation::new(directory.clone(), realtime)),
        );
        let admin_key_digest = config.admin_key.as_deref().map(|key| codec.digest(key));

        Self {
            config,
            store,
            codec,
            admin_key_digest,
            bootstrap,
            directory,
            handshake,
            authorization,
        }
    }
}

/// Parse the `type` query parameter, defaulting to RFID
pub(crate) fn parse_token_type(raw: Option<&str>) -> Result<TokenType, crate::api::error::ApiError> {
    match raw {
        None => Ok(TokenType::default()),
        Some(value) => value
            .parse()
            .map_err(crate::api::error::ApiError::InvalidParameters),
    }
}
