//! Version negotiation - picks the protocol version and endpoint set to use with a peer

use async_trait::async_trait;
use ocpi_core::{
    AllowedType, DisplayText, Endpoint, LocationReferences, TokenType, Version, VersionDetails,
    VersionNumber,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BridgeError, Result};

/// Versions this system implements, highest first
pub const SUPPORTED_VERSIONS: &[VersionNumber] = &[VersionNumber::V2_2_1];

/// Fetches a peer's discovery documents
///
/// Implementations must bound each call with a timeout and must report a
/// network failure (`BridgeError::Transport`) distinctly from a non-2xx
/// answer (`BridgeError::Status`).
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// GET the versions list at `url`, authenticated with `token`
    async fn fetch_versions(&self, url: &str, token: &str) -> Result<Vec<Version>>;

    /// GET the version details document at `url`
    async fn fetch_version_details(&self, url: &str, token: &str) -> Result<VersionDetails>;

    /// Get a description of this client (for logging)
    fn description(&self) -> &str {
        "peer discovery"
    }
}

/// Authorization answer returned by a token's issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAuthorization {
    pub allowed: AllowedType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<DisplayText>,
}

/// Real-time authorization call to the party that issued a token
#[async_trait]
pub trait RealtimeAuthorization: Send + Sync {
    /// POST `{tokens_url}/{uid}/authorize?type=...` authenticated with `token`
    async fn authorize(
        &self,
        tokens_url: &str,
        token: &str,
        uid: &str,
        token_type: TokenType,
        location: Option<&LocationReferences>,
    ) -> Result<RemoteAuthorization>;
}

/// Outcome of a successful negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedVersion {
    pub version: VersionNumber,
    pub endpoints: Vec<Endpoint>,
}

/// Version negotiator
///
/// Calls the peer's versions list, picks the numerically greatest version
/// present on both sides, then fetches that version's endpoint catalog.
/// There is no retry: a failed negotiation is returned to the caller.
pub struct VersionNegotiator {
    discovery: Arc<dyn PeerDiscovery>,
    supported: Vec<VersionNumber>,
}

impl VersionNegotiator {
    /// Create a negotiator supporting [`SUPPORTED_VERSIONS`]
    pub fn new(discovery: Arc<dyn PeerDiscovery>) -> Self {
        Self {
            discovery,
            supported: SUPPORTED_VERSIONS.to_vec(),
        }
    }

    /// Override the set of versions this side supports
    pub fn with_supported_versions(mut self, versions: Vec<VersionNumber>) -> Self {
        self.supported = versions;
        self
    }

    pub fn supported_versions(&self) -> &[VersionNumber] {
        &self.supported
    }

    /// Pick the highest mutually supported version from a peer's list
    pub fn select_version<'a>(&self, offered: &'a [Version]) -> Option<(VersionNumber, &'a Version)> {
        offered
            .iter()
            .filter_map(|v| v.number().map(|n| (n, v)))
            .filter(|(n, _)| self.supported.contains(n))
            .max_by_key(|(n, _)| *n)
    }

    /// Negotiate with the peer whose versions list lives at `discovery_url`
    ///
    /// # Errors
    /// * `BridgeError::NoMatchingVersion` - no version in common
    /// * `BridgeError::UnreachablePeer` - either discovery call failed
    pub async fn negotiate(&self, discovery_url: &str, token: &str) -> Result<NegotiatedVersion> {
        let offered = self
            .discovery
            .fetch_versions(discovery_url, token)
            .await
            .map_err(|e| unreachable(discovery_url, e))?;

        let (version, entry) = self.select_version(&offered).ok_or_else(|| {
            warn!(
                url = %discovery_url,
                offered = ?offered.iter().map(|v| v.version.as_str()).collect::<Vec<_>>(),
                "No mutually supported OCPI version"
            );
            BridgeError::NoMatchingVersion {
                offered: offered.iter().map(|v| v.version.clone()).collect(),
            }
        })?;

        let details = self
            .discovery
            .fetch_version_details(&entry.url, token)
            .await
            .map_err(|e| unreachable(&entry.url, e))?;

        if details.version != version.as_str() {
            warn!(
                expected = %version,
                received = %details.version,
                "Version details document reports a different version"
            );
        }

        info!(
            url = %discovery_url,
            version = %version,
            endpoints = details.endpoints.len(),
            "Negotiated OCPI version"
        );

        Ok(NegotiatedVersion {
            version,
            endpoints: details.endpoints,
        })
    }
}

fn unreachable(url: &str, err: BridgeError) -> BridgeError {
    warn!(url = %url, error = %err, "Peer discovery call failed");
    match err {
        BridgeError::UnreachablePeer(_) => err,
        other => BridgeError::UnreachablePeer(other.to_string()),
    }
}
