//! Outbound clients implementing the bridge traits

pub mod http;
pub mod mock;

pub use http::PeerClient;
pub use mock::{MockPeerDiscovery, MockRealtimeAuthorization};
