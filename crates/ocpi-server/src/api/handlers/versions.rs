//! Version discovery handlers
//!
//! Both documents are public so a prospective peer can find our
//! credentials endpoint before it holds any token.

use axum::{extract::State, Json};
use ocpi_core::versions::modules;
use ocpi_core::{Endpoint, InterfaceRole, OcpiResponse, Version, VersionDetails, VersionNumber};
use std::sync::Arc;

use super::AppState;

/// List the versions we implement
///
/// GET /ocpi/versions
pub async fn get_versions(State(state): State<Arc<AppState>>) -> Json<OcpiResponse<Vec<Version>>> {
    Json(OcpiResponse::success(vec![Version {
        version: VersionNumber::V2_2_1.to_string(),
        url: state.config.version_details_url(),
    }]))
}

/// Endpoint catalog for 2.2.1
///
/// GET /ocpi/2.2.1
pub async fn get_version_details(
    State(state): State<Arc<AppState>>,
) -> Json<OcpiResponse<VersionDetails>> {
    let endpoint = |identifier: &str, role: InterfaceRole| Endpoint {
        identifier: identifier.to_string(),
        role: Some(role),
        url: state.config.module_url(identifier),
    };

    Json(OcpiResponse::success(VersionDetails {
        version: VersionNumber::V2_2_1.to_string(),
        endpoints: vec![
            endpoint(modules::CREDENTIALS, InterfaceRole::Sender),
            endpoint(modules::CREDENTIALS, InterfaceRole::Receiver),
            endpoint(modules::TOKENS, InterfaceRole::Receiver),
        ],
    }))
}
