//! Error types for the Peer Bridge

use thiserror::Error;

/// Result type for Peer Bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while talking to a peer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Network failure or timeout; no HTTP response was received
    #[error("Transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// The peer answered with a non-2xx HTTP status
    #[error("Peer returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The peer answered 2xx but the OCPI envelope carried an error code
    #[error("Peer rejected {url} with OCPI status {status_code}: {message}")]
    Rejected { url: String, status_code: u16, message: String },

    /// The response body could not be understood
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// A URL the peer advertised cannot be called
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// No version is supported by both sides
    #[error("No matching version (peer offers {offered:?})")]
    NoMatchingVersion { offered: Vec<String> },

    /// Negotiation could not complete because a discovery call failed
    #[error("Peer unreachable: {0}")]
    UnreachablePeer(String),
}

impl BridgeError {
    /// Whether the failure happened before any HTTP response arrived
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport { .. })
    }
}
