//! Version discovery documents
//!
//! A party publishes a list of supported versions at its discovery URL and,
//! per version, the catalog of module endpoints it implements.

use serde::{Deserialize, Serialize};

use crate::error::OcpiError;

/// Well-known module identifiers
pub mod modules {
    pub const CREDENTIALS: &str = "credentials";
    pub const TOKENS: &str = "tokens";
    pub const LOCATIONS: &str = "locations";
    pub const SESSIONS: &str = "sessions";
}

/// OCPI protocol version, ordered by numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionNumber {
    V2_0,
    V2_1,
    V2_1_1,
    V2_2,
    V2_2_1,
}

impl VersionNumber {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionNumber::V2_0 => "2.0",
            VersionNumber::V2_1 => "2.1",
            VersionNumber::V2_1_1 => "2.1.1",
            VersionNumber::V2_2 => "2.2",
            VersionNumber::V2_2_1 => "2.2.1",
        }
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VersionNumber {
    type Err = OcpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2.0" => Ok(VersionNumber::V2_0),
            "2.1" => Ok(VersionNumber::V2_1),
            "2.1.1" => Ok(VersionNumber::V2_1_1),
            "2.2" => Ok(VersionNumber::V2_2),
            "2.2.1" => Ok(VersionNumber::V2_2_1),
            other => Err(OcpiError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl Serialize for VersionNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Entry of a versions list. The version stays a raw string so that lists
/// advertising versions we do not know still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
    pub url: String,
}

impl Version {
    /// Parsed version number, `None` for versions this crate does not know
    pub fn number(&self) -> Option<VersionNumber> {
        self.version.parse().ok()
    }
}

/// Whether an endpoint is the sender or receiver side of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterfaceRole {
    Sender,
    Receiver,
}

impl std::fmt::Display for InterfaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceRole::Sender => f.write_str("SENDER"),
            InterfaceRole::Receiver => f.write_str("RECEIVER"),
        }
    }
}

impl std::str::FromStr for InterfaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENDER" => Ok(InterfaceRole::Sender),
            "RECEIVER" => Ok(InterfaceRole::Receiver),
            _ => Err(format!("Unknown interface role: {}", s)),
        }
    }
}

/// Module endpoint in a version details document. OCPI 2.1.1 omits `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<InterfaceRole>,
    pub url: String,
}

/// Version details document: `{version, endpoints[]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDetails {
    pub version: String,
    pub endpoints: Vec<Endpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering_is_numeric() {
        assert!(VersionNumber::V2_2_1 > VersionNumber::V2_2);
        assert!(VersionNumber::V2_2 > VersionNumber::V2_1_1);
        assert!(VersionNumber::V2_1_1 > VersionNumber::V2_0);
    }

    #[test]
    fn test_unknown_version_in_list() {
        let v = Version { version: "3.0".into(), url: "https://x".into() };
        assert!(v.number().is_none());
        let v = Version { version: "2.2.1".into(), url: "https://x".into() };
        assert_eq!(v.number(), Some(VersionNumber::V2_2_1));
    }

    #[test]
    fn test_endpoint_without_role() {
        let e: Endpoint =
            serde_json::from_str(r#"{"identifier":"tokens","url":"https://x/tokens"}"#).unwrap();
        assert!(e.role.is_none());
        let e: Endpoint = serde_json::from_str(
            r#"{"identifier":"tokens","role":"SENDER","url":"https://x/tokens"}"#,
        )
        .unwrap();
        assert_eq!(e.role, Some(InterfaceRole::Sender));
    }
}
