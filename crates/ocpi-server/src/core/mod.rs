//! Core logic for the credentials plane

pub mod authorization;
pub mod handshake;
pub mod scope;

pub use authorization::{
    AuthorizationError, PeerTokenConfirmation, TokenAuthorizationEngine, TokenConfirmation,
};
pub use handshake::{CredentialsHandshake, HandshakeError};
pub use scope::{ScopeError, TenantContext, TenantScope, TokenPatch};
