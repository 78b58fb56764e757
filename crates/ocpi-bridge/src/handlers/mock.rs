//! Mock peers
//!
//! For testing purposes - serve canned discovery documents and
//! authorization answers without any network.

use async_trait::async_trait;
use ocpi_core::{AllowedType, Endpoint, LocationReferences, TokenType, Version, VersionDetails};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{BridgeError, Result};
use crate::negotiator::{PeerDiscovery, RealtimeAuthorization, RemoteAuthorization};

/// Mock peer discovery
///
/// URLs without a registered document behave like a host that refuses the
/// connection. Every call is recorded as `(url, token)`.
#[derive(Default)]
pub struct MockPeerDiscovery {
    versions: HashMap<String, Vec<Version>>,
    details: HashMap<String, VersionDetails>,
    rejected: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockPeerDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A peer with a single version and its endpoint catalog
    pub fn advertising(versions_url: &str, version: &str, endpoints: Vec<Endpoint>) -> Self {
        let details_url = format!("{}/{}", versions_url.trim_end_matches("/versions"), version);
        Self::new()
            .with_versions(
                versions_url,
                vec![Version {
                    version: version.to_string(),
                    url: details_url.clone(),
                }],
            )
            .with_details(&details_url, version, endpoints)
    }

    pub fn with_versions(mut self, url: &str, versions: Vec<Version>) -> Self {
        self.versions.insert(url.to_string(), versions);
        self
    }

    pub fn with_details(mut self, url: &str, version: &str, endpoints: Vec<Endpoint>) -> Self {
        self.details.insert(
            url.to_string(),
            VersionDetails {
                version: version.to_string(),
                endpoints,
            },
        );
        self
    }

    /// Make `url` answer HTTP 401
    pub fn rejecting(mut self, url: &str) -> Self {
        self.rejected.insert(url.to_string());
        self
    }

    /// Calls made so far as `(url, token)`
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, url: &str, token: &str) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), token.to_string()));
        }
        if self.rejected.contains(url) {
            return Err(BridgeError::Status { url: url.to_string(), status: 401 });
        }
        Ok(())
    }

    fn refused(url: &str) -> BridgeError {
        BridgeError::Transport {
            url: url.to_string(),
            message: "connection refused".into(),
        }
    }
}

#[async_trait]
impl PeerDiscovery for MockPeerDiscovery {
    async fn fetch_versions(&self, url: &str, token: &str) -> Result<Vec<Version>> {
        self.record(url, token)?;
        self.versions.get(url).cloned().ok_or_else(|| Self::refused(url))
    }

    async fn fetch_version_details(&self, url: &str, token: &str) -> Result<VersionDetails> {
        self.record(url, token)?;
        self.details.get(url).cloned().ok_or_else(|| Self::refused(url))
    }

    fn description(&self) -> &str {
        "mock peer discovery"
    }
}

/// Mock real-time authorization
///
/// Answers every call with the configured decision, or fails like an
/// unreachable peer when constructed with [`MockRealtimeAuthorization::failing`].
pub struct MockRealtimeAuthorization {
    outcome: Option<AllowedType>,
    calls: AtomicUsize,
}

impl MockRealtimeAuthorization {
    pub fn responding(allowed: AllowedType) -> Self {
        Self {
            outcome: Some(allowed),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeAuthorization for MockRealtimeAuthorization {
    async fn authorize(
        &self,
        tokens_url: &str,
        _token: &str,
        uid: &str,
        _token_type: TokenType,
        _location: Option<&LocationReferences>,
    ) -> Result<RemoteAuthorization> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Some(allowed) => Ok(RemoteAuthorization {
                allowed,
                authorization_reference: Some(format!("remote-{}", uid)),
                info: None,
            }),
            None => Err(BridgeError::Transport {
                url: tokens_url.to_string(),
                message: "connection refused".into(),
            }),
        }
    }
}
