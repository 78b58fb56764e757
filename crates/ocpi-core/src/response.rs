//! The OCPI response envelope
//!
//! Every OCPI response body carries a numeric status code and a timestamp
//! next to the optional payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OCPI status code carried in every response envelope
///
/// 1xxx success, 2xxx client errors, 3xxx server errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(1000);
    pub const CLIENT_ERROR: StatusCode = StatusCode(2000);
    pub const INVALID_PARAMETERS: StatusCode = StatusCode(2001);
    pub const NOT_ENOUGH_INFORMATION: StatusCode = StatusCode(2002);
    pub const UNKNOWN_TOKEN: StatusCode = StatusCode(2004);
    pub const SERVER_ERROR: StatusCode = StatusCode(3000);
    pub const UNABLE_TO_USE_CLIENT_API: StatusCode = StatusCode(3001);
    pub const UNSUPPORTED_VERSION: StatusCode = StatusCode(3002);
    pub const NO_MATCHING_ENDPOINTS: StatusCode = StatusCode(3003);

    pub fn is_success(self) -> bool {
        (1000..2000).contains(&self.0)
    }

    pub fn is_client_error(self) -> bool {
        (2000..3000).contains(&self.0)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcpiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub status_code: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> OcpiResponse<T> {
    /// Successful response carrying `data`
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            status_code: StatusCode::SUCCESS,
            status_message: Some("Success".into()),
            timestamp: Utc::now(),
        }
    }

    /// Successful response without a payload
    pub fn empty() -> Self {
        Self {
            data: None,
            status_code: StatusCode::SUCCESS,
            status_message: Some("Success".into()),
            timestamp: Utc::now(),
        }
    }

    /// Error response
    pub fn error(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            data: None,
            status_code,
            status_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Unwrap the payload of a successful envelope
    pub fn into_data(self) -> Option<T> {
        if self.status_code.is_success() {
            self.data
        } else {
            None
        }
    }
}
