//! HTTP Peer Client
//!
//! Talks to other OCPI parties with reqwest. Every call carries
//! `Authorization: Token <base64(token)>`, the OCPI correlation headers and
//! a per-call timeout.

use async_trait::async_trait;
use ocpi_core::{
    LocationReferences, OcpiResponse, TokenCodec, TokenType, Version, VersionDetails,
};
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::negotiator::{PeerDiscovery, RealtimeAuthorization, RemoteAuthorization};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for calls to OCPI peers
#[derive(Debug, Clone)]
pub struct PeerClient {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl PeerClient {
    /// Create a client whose calls time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request<U: reqwest::IntoUrl>(
        &self,
        method: reqwest::Method,
        url: U,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.http_client
            .request(method, url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, TokenCodec::to_authorization_header_value(token))
            .header("X-Request-ID", request_id.as_str())
            .header("X-Correlation-ID", request_id.as_str())
    }

    /// Send a request and unwrap the OCPI envelope
    async fn send<T: DeserializeOwned>(&self, url: &str, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| BridgeError::Transport {
            url: url.to_string(),
            message: if e.is_timeout() {
                format!("timed out after {:?}", self.timeout)
            } else {
                e.to_string()
            },
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: OcpiResponse<T> = response.json().await.map_err(|e| {
            BridgeError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        if !envelope.status_code.is_success() {
            return Err(BridgeError::Rejected {
                url: url.to_string(),
                status_code: envelope.status_code.0,
                message: envelope.status_message.unwrap_or_default(),
            });
        }

        debug!(url = %url, status_code = %envelope.status_code, "Peer call succeeded");

        envelope.data.ok_or_else(|| BridgeError::InvalidResponse {
            url: url.to_string(),
            message: "missing data".into(),
        })
    }
}

#[async_trait]
impl PeerDiscovery for PeerClient {
    async fn fetch_versions(&self, url: &str, token: &str) -> Result<Vec<Version>> {
        debug!(url = %url, "Fetching peer versions");
        let request = self.request(reqwest::Method::GET, url, token);
        self.send(url, request).await
    }

    async fn fetch_version_details(&self, url: &str, token: &str) -> Result<VersionDetails> {
        debug!(url = %url, "Fetching peer version details");
        let request = self.request(reqwest::Method::GET, url, token);
        self.send(url, request).await
    }

    fn description(&self) -> &str {
        "reqwest peer client"
    }
}

#[async_trait]
impl RealtimeAuthorization for PeerClient {
    async fn authorize(
        &self,
        tokens_url: &str,
        token: &str,
        uid: &str,
        token_type: TokenType,
        location: Option<&LocationReferences>,
    ) -> Result<RemoteAuthorization> {
        let url = authorize_url(tokens_url, uid, token_type)?;
        debug!(url = %url, "Requesting real-time authorization");

        let mut request = self.request(reqwest::Method::POST, url.clone(), token);
        if let Some(location) = location {
            request = request.json(location);
        }
        self.send(url.as_str(), request).await
    }
}

/// `{tokens_url}/{uid}/authorize?type=..`, with `uid` encoded as a single path segment
fn authorize_url(tokens_url: &str, uid: &str, token_type: TokenType) -> Result<Url> {
    let invalid = |message: String| BridgeError::InvalidUrl {
        url: tokens_url.to_string(),
        message,
    };
    let mut url = Url::parse(tokens_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base URL".into()))?
        .pop_if_empty()
        .push(uid)
        .push("authorize");
    url.query_pairs_mut().append_pair("type", token_type.as_str());
    Ok(url)
}
