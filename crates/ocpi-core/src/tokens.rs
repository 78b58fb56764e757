//! Physical access tokens and authorization results
//!
//! A `PhysicalToken` is an immutable aggregate. It is created from
//! `TokenFields` after validation and changes only by whole-record
//! replacement or through `invalidate` and `update_whitelist`, each of which
//! returns a new value with a bumped `last_updated`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::PartyIdentity;
use crate::validation::{validate_token_fields, ValidationError};

/// Kind of physical or virtual token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    AdHocUser,
    AppUser,
    Other,
    #[default]
    Rfid,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::AdHocUser => "AD_HOC_USER",
            TokenType::AppUser => "APP_USER",
            TokenType::Other => "OTHER",
            TokenType::Rfid => "RFID",
        }
    }
}

impl std::str::FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AD_HOC_USER" => Ok(TokenType::AdHocUser),
            "APP_USER" => Ok(TokenType::AppUser),
            "OTHER" => Ok(TokenType::Other),
            "RFID" => Ok(TokenType::Rfid),
            _ => Err(format!("Unknown token type: {}", s)),
        }
    }
}

/// Whether an authorization may be served locally or needs a live confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistType {
    Always,
    Allowed,
    AllowedOffline,
    Never,
}

impl WhitelistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhitelistType::Always => "ALWAYS",
            WhitelistType::Allowed => "ALLOWED",
            WhitelistType::AllowedOffline => "ALLOWED_OFFLINE",
            WhitelistType::Never => "NEVER",
        }
    }
}

impl std::str::FromStr for WhitelistType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALWAYS" => Ok(WhitelistType::Always),
            "ALLOWED" => Ok(WhitelistType::Allowed),
            "ALLOWED_OFFLINE" => Ok(WhitelistType::AllowedOffline),
            "NEVER" => Ok(WhitelistType::Never),
            _ => Err(format!("Unknown whitelist type: {}", s)),
        }
    }
}

/// Raw token fields as they travel on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFields {
    pub country_code: String,
    pub party_id: String,
    pub uid: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub contract_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_number: Option<String>,
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub valid: bool,
    pub whitelist: WhitelistType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Validated physical token aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenFields", into = "TokenFields")]
pub struct PhysicalToken {
    fields: TokenFields,
}

impl PhysicalToken {
    pub fn new(fields: TokenFields) -> Result<Self, ValidationError> {
        validate_token_fields(&fields)?;
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &TokenFields {
        &self.fields
    }

    /// Owner of the token (the eMSP that issued it)
    pub fn owner(&self) -> PartyIdentity {
        PartyIdentity::new(&self.fields.country_code, &self.fields.party_id)
    }

    pub fn uid(&self) -> &str {
        &self.fields.uid
    }

    pub fn token_type(&self) -> TokenType {
        self.fields.token_type
    }

    pub fn is_valid(&self) -> bool {
        self.fields.valid
    }

    pub fn whitelist(&self) -> WhitelistType {
        self.fields.whitelist
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.fields.last_updated
    }

    /// Mark the token invalid
    pub fn invalidate(&self, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::new(TokenFields {
            valid: false,
            last_updated: bump(self.fields.last_updated, now),
            ..self.fields.clone()
        })
    }

    /// Change the whitelist policy
    pub fn update_whitelist(
        &self,
        whitelist: WhitelistType,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Self::new(TokenFields {
            whitelist,
            last_updated: bump(self.fields.last_updated, now),
            ..self.fields.clone()
        })
    }
}

// Never move the timestamp backwards, even if the clock did.
fn bump(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + chrono::Duration::milliseconds(1)
    }
}

impl TryFrom<TokenFields> for PhysicalToken {
    type Error = ValidationError;

    fn try_from(fields: TokenFields) -> Result<Self, Self::Error> {
        PhysicalToken::new(fields)
    }
}

impl From<PhysicalToken> for TokenFields {
    fn from(token: PhysicalToken) -> Self {
        token.fields
    }
}

/// Authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowedType {
    Allowed,
    Blocked,
    Expired,
    NoCredit,
    NotAllowed,
}

/// Location/EVSE restriction of an authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReferences {
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evse_uids: Vec<String>,
}

/// Human readable text with its language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayText {
    pub language: String,
    pub text: String,
}

impl DisplayText {
    pub fn en(text: impl Into<String>) -> Self {
        Self { language: "en".into(), text: text.into() }
    }
}

/// Result of an authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationInfo {
    pub allowed: AllowedType,
    pub token: PhysicalToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationReferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<DisplayText>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TokenFields {
        TokenFields {
            country_code: "NL".into(),
            party_id: "TST".into(),
            uid: "012345678".into(),
            token_type: TokenType::Rfid,
            contract_id: "NL-TST-C12345678-X".into(),
            visual_number: None,
            issuer: "Test eMSP".into(),
            group_id: None,
            valid: true,
            whitelist: WhitelistType::Allowed,
            language: Some("nl".into()),
            last_updated: Utc::now() - chrono::Duration::minutes(5),
        }
    }

    #[test]
    fn test_construction_validates() {
        assert!(PhysicalToken::new(fields()).is_ok());

        let mut bad = fields();
        bad.contract_id = String::new();
        assert_eq!(PhysicalToken::new(bad), Err(ValidationError::Empty("contract_id")));

        let mut bad = fields();
        bad.issuer = "i".repeat(65);
        assert!(PhysicalToken::new(bad).is_err());
    }

    #[test]
    fn test_invalidate_bumps_timestamp() {
        let token = PhysicalToken::new(fields()).unwrap();
        let invalid = token.invalidate(Utc::now()).unwrap();
        assert!(!invalid.is_valid());
        assert!(invalid.last_updated() > token.last_updated());
        // the original is untouched
        assert!(token.is_valid());
    }

    #[test]
    fn test_update_whitelist_with_stale_clock() {
        let token = PhysicalToken::new(fields()).unwrap();
        let stale = token.last_updated() - chrono::Duration::hours(1);
        let updated = token.update_whitelist(WhitelistType::Never, stale).unwrap();
        assert_eq!(updated.whitelist(), WhitelistType::Never);
        assert!(updated.last_updated() > token.last_updated());
    }

    #[test]
    fn test_deserialize_rejects_invalid_fields() {
        let mut json = serde_json::to_value(fields()).unwrap();
        json["party_id"] = serde_json::json!("TOOLONG");
        assert!(serde_json::from_value::<PhysicalToken>(json).is_err());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(PhysicalToken::new(fields()).unwrap()).unwrap();
        assert_eq!(json["type"], "RFID");
        assert_eq!(json["whitelist"], "ALLOWED");
        assert_eq!(
            serde_json::to_value(WhitelistType::AllowedOffline).unwrap(),
            "ALLOWED_OFFLINE"
        );
        assert_eq!(serde_json::to_value(AllowedType::NoCredit).unwrap(), "NO_CREDIT");
    }
}
