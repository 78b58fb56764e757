//! Peer and bootstrap-token records
//!
//! These are the persisted shapes behind the credential lifecycle. Storage
//! backends build them from rows; state changes go through the named
//! transitions so that timestamps and token fields move together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credentials::{Credentials, CredentialsRole, PartyIdentity};
use crate::versions::{Endpoint, InterfaceRole, VersionNumber};

/// Trust status of a peer
///
/// `PENDING -> REGISTERED -> REVOKED`. REGISTERED may be re-entered by a
/// rotation; REVOKED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeerStatus {
    Pending,
    Registered,
    Revoked,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerStatus::Pending => "PENDING",
            PeerStatus::Registered => "REGISTERED",
            PeerStatus::Revoked => "REVOKED",
        }
    }
}

impl std::str::FromStr for PeerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PeerStatus::Pending),
            "REGISTERED" => Ok(PeerStatus::Registered),
            "REVOKED" => Ok(PeerStatus::Revoked),
            _ => Err(format!("Unknown peer status: {}", s)),
        }
    }
}

/// A known OCPI party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: Uuid,
    pub identity: PartyIdentity,
    /// The peer's versions discovery URL
    pub url: String,
    pub roles: Vec<CredentialsRole>,
    /// Token B: what we send when calling the peer
    pub our_token_for_peer: String,
    /// Digest of token C, set only while REGISTERED
    pub peer_token_digest: Option<String>,
    pub version: Option<VersionNumber>,
    pub status: PeerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Peer {
    /// A fresh PENDING peer built from credentials it sent us.
    ///
    /// Returns `None` when the credentials carry no role.
    pub fn pending(credentials: &Credentials, now: DateTime<Utc>) -> Option<Self> {
        let identity = credentials.primary_identity()?;
        Some(Self {
            id: Uuid::new_v4(),
            identity,
            url: credentials.url.clone(),
            roles: credentials.roles.clone(),
            our_token_for_peer: credentials.token.clone(),
            peer_token_digest: None,
            version: None,
            status: PeerStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the remote-facing fields and restart trust negotiation.
    ///
    /// Any token C issued earlier stops authenticating.
    pub fn rotate_credentials(&self, credentials: &Credentials, now: DateTime<Utc>) -> Self {
        Self {
            url: credentials.url.clone(),
            roles: credentials.roles.clone(),
            our_token_for_peer: credentials.token.clone(),
            peer_token_digest: None,
            status: PeerStatus::Pending,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Promote to REGISTERED with a freshly issued token C digest.
    pub fn register(
        &self,
        credentials: &Credentials,
        peer_token_digest: String,
        version: VersionNumber,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            url: credentials.url.clone(),
            roles: credentials.roles.clone(),
            our_token_for_peer: credentials.token.clone(),
            peer_token_digest: Some(peer_token_digest),
            version: Some(version),
            status: PeerStatus::Registered,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Move to the terminal REVOKED state.
    pub fn revoke(&self, now: DateTime<Utc>) -> Self {
        Self {
            status: PeerStatus::Revoked,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.status == PeerStatus::Revoked
    }
}

/// One module endpoint of a registered peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEndpoint {
    pub peer_id: Uuid,
    pub identifier: String,
    pub role: Option<InterfaceRole>,
    pub url: String,
}

impl PeerEndpoint {
    pub fn from_endpoint(peer_id: Uuid, endpoint: &Endpoint) -> Self {
        Self {
            peer_id,
            identifier: endpoint.identifier.clone(),
            role: endpoint.role,
            url: endpoint.url.clone(),
        }
    }
}

/// Label written into `used_by` when an operator disables a token
pub const ADMIN_DEACTIVATED: &str = "ADMIN_DEACTIVATED";

/// Single-use pre-shared registration secret (token A)
///
/// Only the digest of the secret is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapToken {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub secret_digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BootstrapToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    /// Usability at `now`. A used token reports ALREADY_USED even when it
    /// has also expired.
    pub fn usability(&self, now: DateTime<Utc>) -> Usability {
        if self.used_at.is_some() {
            Usability::unusable(UnusableReason::AlreadyUsed)
        } else if self.is_expired(now) {
            Usability::unusable(UnusableReason::Expired)
        } else {
            Usability::usable()
        }
    }

    /// Mark used. Returns `None` when the token was already used.
    pub fn consume(&self, used_by: &str, now: DateTime<Utc>) -> Option<Self> {
        if self.used_at.is_some() {
            return None;
        }
        Some(Self {
            used_at: Some(now),
            used_by: Some(used_by.to_string()),
            ..self.clone()
        })
    }
}

/// Why a bootstrap token cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnusableReason {
    NotFound,
    AlreadyUsed,
    Expired,
}

impl std::fmt::Display for UnusableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnusableReason::NotFound => f.write_str("NOT_FOUND"),
            UnusableReason::AlreadyUsed => f.write_str("ALREADY_USED"),
            UnusableReason::Expired => f.write_str("EXPIRED"),
        }
    }
}

/// Outcome of a bootstrap usability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usability {
    pub usable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnusableReason>,
}

impl Usability {
    pub fn usable() -> Self {
        Self { usable: true, reason: None }
    }

    pub fn unusable(reason: UnusableReason) -> Self {
        Self { usable: false, reason: Some(reason) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Role;
    use chrono::Duration;

    fn credentials(token: &str) -> Credentials {
        Credentials {
            token: token.into(),
            url: "https://peer.example.com/ocpi/versions".into(),
            roles: vec![CredentialsRole {
                role: Role::Emsp,
                business_details: None,
                party_id: "TST".into(),
                country_code: "NL".into(),
            }],
        }
    }

    fn bootstrap(expires_at: Option<DateTime<Utc>>) -> BootstrapToken {
        BootstrapToken {
            id: Uuid::new_v4(),
            secret_digest: "abc".into(),
            description: None,
            expires_at,
            used_at: None,
            used_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rotation_clears_token_c() {
        let now = Utc::now();
        let peer = Peer::pending(&credentials("B1"), now).unwrap();
        let registered = peer.register(&credentials("B1"), "digest".into(), VersionNumber::V2_2_1, now);
        assert_eq!(registered.status, PeerStatus::Registered);

        let rotated = registered.rotate_credentials(&credentials("B2"), now);
        assert_eq!(rotated.id, peer.id);
        assert_eq!(rotated.status, PeerStatus::Pending);
        assert_eq!(rotated.our_token_for_peer, "B2");
        assert!(rotated.peer_token_digest.is_none());
    }

    #[test]
    fn test_pending_requires_role() {
        let mut creds = credentials("B1");
        creds.roles.clear();
        assert!(Peer::pending(&creds, Utc::now()).is_none());
    }

    #[test]
    fn test_used_dominates_expired() {
        let now = Utc::now();
        let token = bootstrap(Some(now - Duration::days(1)));
        assert_eq!(token.usability(now).reason, Some(UnusableReason::Expired));

        let used = bootstrap(Some(now + Duration::days(1))).consume("NL-TST", now).unwrap();
        assert_eq!(
            used.usability(now + Duration::days(30)).reason,
            Some(UnusableReason::AlreadyUsed)
        );
        assert!(used.consume("NL-TST", now).is_none());
    }

    #[test]
    fn test_no_expiry_is_usable() {
        assert!(bootstrap(None).usability(Utc::now()).usable);
    }
}
