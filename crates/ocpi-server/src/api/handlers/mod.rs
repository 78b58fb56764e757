//! API handlers

mod admin;
mod credentials;
mod state;
mod tokens;
mod versions;

pub use admin::{
    authorize_token, cleanup_bootstrap_tokens, deactivate_bootstrap_token, issue_bootstrap_token,
    list_bootstrap_tokens, list_peers, remove_peer, AuthorizeQuery, IssueBootstrapTokenRequest,
    PeerSummary,
};
pub use credentials::{delete_credentials, get_credentials, post_credentials, put_credentials};
pub use state::AppState;
pub use tokens::{get_token, patch_token, put_token, TokenTypeQuery};
pub use versions::{get_version_details, get_versions};
