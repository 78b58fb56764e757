//! API error types and responses
//!
//! Every error leaves the server as an OCPI envelope: `data` absent, an OCPI
//! `status_code` and a human readable `status_message`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ocpi_core::{OcpiResponse, StatusCode as OcpiStatus};
use thiserror::Error;
use tracing::error;

use crate::core::{AuthorizationError, HandshakeError, ScopeError};
use crate::registry::{BootstrapError, DirectoryError};
use crate::storage::StorageError;

/// Message for every authentication failure; the real reason is only logged
pub const UNAUTHENTICATED_MESSAGE: &str = "invalid or unknown credentials";

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Unable to use client API: {0}")]
    UnableToUseClientApi(String),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidParameters(msg) => {
                (StatusCode::BAD_REQUEST, OcpiStatus::INVALID_PARAMETERS, msg.clone())
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                OcpiStatus::CLIENT_ERROR,
                UNAUTHENTICATED_MESSAGE.to_string(),
            ),
            ApiError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, OcpiStatus::CLIENT_ERROR, msg.clone())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, OcpiStatus::CLIENT_ERROR, msg.clone()),
            ApiError::UnknownToken(msg) => {
                (StatusCode::NOT_FOUND, OcpiStatus::UNKNOWN_TOKEN, msg.clone())
            }
            ApiError::UnableToUseClientApi(msg) => {
                (StatusCode::BAD_GATEWAY, OcpiStatus::UNABLE_TO_USE_CLIENT_API, msg.clone())
            }
            ApiError::UnsupportedVersion(msg) => {
                (StatusCode::BAD_GATEWAY, OcpiStatus::UNSUPPORTED_VERSION, msg.clone())
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    OcpiStatus::SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(OcpiResponse::<()>::error(code, message))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::InvalidParameters(err.body_text())
    }
}

impl From<HandshakeError> for ApiError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Bootstrap(_) => ApiError::Unauthenticated,
            HandshakeError::InvalidParameters(msg) => ApiError::InvalidParameters(msg),
            HandshakeError::PeerRevoked(_) => ApiError::InvalidParameters(err.to_string()),
            HandshakeError::NoMatchingVersion { .. } => ApiError::UnsupportedVersion(err.to_string()),
            HandshakeError::UnreachablePeer(msg) => ApiError::UnableToUseClientApi(msg),
            HandshakeError::Storage(e) => e.into(),
        }
    }
}

impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            ScopeError::InvalidParameters(msg) => ApiError::InvalidParameters(msg),
            ScopeError::Validation(e) => ApiError::InvalidParameters(e.to_string()),
            ScopeError::Storage(e) => e.into(),
        }
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::UnknownToken { .. } => ApiError::UnknownToken(err.to_string()),
            AuthorizationError::AmbiguousToken { .. } => ApiError::InvalidParameters(err.to_string()),
            AuthorizationError::ConfirmationFailed(msg) => ApiError::UnableToUseClientApi(msg),
            AuthorizationError::Storage(e) => e.into(),
        }
    }
}

impl From<BootstrapError> for ApiError {
    fn from(err: BootstrapError) -> Self {
        match err {
            BootstrapError::Unusable(_) => ApiError::Unauthenticated,
            BootstrapError::Storage(e) => e.into(),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Revoked(_) | DirectoryError::MissingRole => {
                ApiError::InvalidParameters(err.to_string())
            }
            DirectoryError::BootstrapConsumed => ApiError::Unauthenticated,
            DirectoryError::Storage(e) => e.into(),
        }
    }
}
