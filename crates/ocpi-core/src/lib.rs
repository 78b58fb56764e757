//! # OCPI Core
//!
//! Wire types, credential aggregates and token primitives shared by the
//! OCPI credentials plane.
//!
//! ## Key Concepts
//!
//! - **Token A**: single-use bootstrap secret for the first registration call
//! - **Token B**: the credential a peer hands us so we can call it back
//! - **Token C**: the credential we generate for the peer to call us afterwards
//! - **Peer**: a registered OCPI party, identified by `(country_code, party_id)`
//! - **Physical token**: an RFID card or app user that may start a charging session
//!
//! Nothing in this crate performs I/O. Storage lives in `ocpi-server`,
//! outbound HTTP in `ocpi-bridge`.

pub mod codec;
pub mod credentials;
pub mod error;
pub mod peer;
pub mod response;
pub mod tokens;
pub mod validation;
pub mod versions;

pub use codec::TokenCodec;
pub use credentials::{BusinessDetails, Credentials, CredentialsRole, Image, PartyIdentity, Role};
pub use error::{OcpiError, Result};
pub use peer::{BootstrapToken, Peer, PeerEndpoint, PeerStatus, UnusableReason, Usability};
pub use response::{OcpiResponse, StatusCode};
pub use tokens::{
    AllowedType, AuthorizationInfo, DisplayText, LocationReferences, PhysicalToken, TokenFields,
    TokenType, WhitelistType,
};
pub use validation::ValidationError;
pub use versions::{Endpoint, InterfaceRole, Version, VersionDetails, VersionNumber};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
