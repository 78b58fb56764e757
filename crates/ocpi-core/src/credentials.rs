//! Credentials exchanged during the registration handshake

use serde::{Deserialize, Serialize};

/// Role a party plays in the OCPI network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Charge Point Operator
    Cpo,
    /// e-Mobility Service Provider
    Emsp,
    Hub,
    Nap,
    Nsp,
    Other,
    Scsp,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Cpo => "CPO",
            Role::Emsp => "EMSP",
            Role::Hub => "HUB",
            Role::Nap => "NAP",
            Role::Nsp => "NSP",
            Role::Other => "OTHER",
            Role::Scsp => "SCSP",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CPO" => Ok(Role::Cpo),
            "EMSP" => Ok(Role::Emsp),
            "HUB" => Ok(Role::Hub),
            "NAP" => Ok(Role::Nap),
            "NSP" => Ok(Role::Nsp),
            "OTHER" => Ok(Role::Other),
            "SCSP" => Ok(Role::Scsp),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Image reference (logo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub category: String,
    #[serde(rename = "type")]
    pub image_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Business details attached to a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDetails {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Image>,
}

/// One role declared in a credentials object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsRole {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_details: Option<BusinessDetails>,
    pub party_id: String,
    pub country_code: String,
}

impl CredentialsRole {
    pub fn identity(&self) -> PartyIdentity {
        PartyIdentity::new(&self.country_code, &self.party_id)
    }
}

/// Credentials object: `{token, url, roles[]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token the receiver should use to call the sender
    pub token: String,
    /// The sender's versions discovery URL
    pub url: String,
    pub roles: Vec<CredentialsRole>,
}

impl Credentials {
    /// Identity of the first declared role, which keys the peer record
    pub fn primary_identity(&self) -> Option<PartyIdentity> {
        self.roles.first().map(CredentialsRole::identity)
    }

    /// Whether any declared role belongs to `identity`
    pub fn declares(&self, identity: &PartyIdentity) -> bool {
        self.roles.iter().any(|r| &r.identity() == identity)
    }
}

/// Composite party identity `(country_code, party_id)`, upper-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyIdentity {
    pub country_code: String,
    pub party_id: String,
}

impl PartyIdentity {
    pub fn new(country_code: &str, party_id: &str) -> Self {
        Self {
            country_code: country_code.to_ascii_uppercase(),
            party_id: party_id.to_ascii_uppercase(),
        }
    }

    /// Case-insensitive comparison against raw path parameters
    pub fn matches(&self, country_code: &str, party_id: &str) -> bool {
        self.country_code.eq_ignore_ascii_case(country_code)
            && self.party_id.eq_ignore_ascii_case(party_id)
    }
}

/// Renders as `{country_code}-{party_id}`, e.g. `NL-TST`
impl std::fmt::Display for PartyIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.country_code, self.party_id)
    }
}
