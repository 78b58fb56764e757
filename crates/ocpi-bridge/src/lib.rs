//! Peer Bridge
//!
//! Everything this system sends *to* another OCPI party goes through the
//! bridge: fetching a peer's discovery documents, negotiating the protocol
//! version, and real-time token authorization calls.
//!
//! ## Architecture
//!
//! Two traits form the outbound seam:
//!
//! - [`PeerDiscovery`]: fetch `/versions` and `/{version}` documents
//! - [`RealtimeAuthorization`]: ask a token's issuer whether it may charge
//!
//! [`PeerClient`] implements both over HTTP with reqwest. The mock handlers
//! serve canned documents for tests.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use ocpi_bridge::{PeerClient, VersionNegotiator};
//!
//! let negotiator = VersionNegotiator::new(Arc::new(PeerClient::new(timeout)));
//! let negotiated = negotiator.negotiate("https://peer.example.com/ocpi/versions", &token_b).await?;
//! println!("Using OCPI {}", negotiated.version);
//! ```

pub mod error;
pub mod handlers;
pub mod negotiator;

pub use error::{BridgeError, Result};
pub use handlers::{MockPeerDiscovery, MockRealtimeAuthorization, PeerClient};
pub use negotiator::{
    NegotiatedVersion, PeerDiscovery, RealtimeAuthorization, RemoteAuthorization,
    VersionNegotiator, SUPPORTED_VERSIONS,
};
