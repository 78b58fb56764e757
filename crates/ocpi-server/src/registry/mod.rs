//! Registries over the store: bootstrap tokens and known peers

pub mod bootstrap;
pub mod peers;

pub use bootstrap::{BootstrapError, BootstrapTokenStore, IssuedBootstrapToken};
pub use peers::{DirectoryError, PeerDirectory};
