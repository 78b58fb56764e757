//! OCPI Credentials Plane Server
//!
//! Lets OCPI 2.2.1 parties establish mutual trust and exchange tokens:
//! - Registers peers through the credentials handshake (token A, B and C)
//! - Negotiates the highest mutually supported version with each peer
//! - Confines every peer request to that peer's own data
//! - Decides real-time token authorizations, asking the issuer when needed
//!
//! ## API Endpoints
//!
//! ### Health
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with peer counts
//!
//! ### OCPI
//! - `GET /ocpi/versions` - Versions we implement (public)
//! - `GET /ocpi/2.2.1` - Endpoint catalog (public)
//! - `POST /ocpi/2.2.1/credentials` - Register with a bootstrap token
//! - `GET|PUT|DELETE /ocpi/2.2.1/credentials` - Read, rotate or drop credentials
//! - `GET|PUT|PATCH /ocpi/2.2.1/tokens/{country_code}/{party_id}/{uid}` - Token receiver
//!
//! ### Admin (requires `X-Admin-Key`)
//! - `POST|GET /admin/bootstrap-tokens` - Issue or list bootstrap tokens
//! - `DELETE /admin/bootstrap-tokens/{id}` - Deactivate a bootstrap token
//! - `POST /admin/bootstrap-tokens/cleanup` - Purge expired bootstrap tokens
//! - `GET /admin/peers` - List peers
//! - `DELETE /admin/peers/{country_code}/{party_id}` - Forget a peer
//! - `POST /admin/tokens/{uid}/authorize` - Real-time authorization decision

pub mod api;
pub mod config;
pub mod core;
pub mod registry;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ConfigError, ServerConfig};
pub use registry::{BootstrapTokenStore, PeerDirectory};
pub use storage::{MemoryStore, OcpiStore, StorageError};
