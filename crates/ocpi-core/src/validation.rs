//! Field validation for OCPI aggregates
//!
//! Validation is a set of pure functions. Aggregates call them when they are
//! constructed and again inside every named transition, so a value that
//! exists is always a valid one.

use thiserror::Error;

use crate::credentials::Credentials;
use crate::tokens::TokenFields;

/// Error returned when a field does not satisfy the OCPI constraints
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{0}' must not be empty")]
    Empty(&'static str),

    #[error("field '{field}' exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("field '{field}' must be exactly {expected} characters")]
    WrongLength { field: &'static str, expected: usize },

    #[error("field '{field}' is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Check a `(country_code, party_id)` pair: ISO-3166 alpha-2 and a 3 character party id.
pub fn validate_identity(country_code: &str, party_id: &str) -> Result<(), ValidationError> {
    exact_ascii("country_code", country_code, 2)?;
    exact_ascii("party_id", party_id, 3)
}

/// Validate every field of a physical token.
pub fn validate_token_fields(fields: &TokenFields) -> Result<(), ValidationError> {
    validate_identity(&fields.country_code, &fields.party_id)?;
    bounded("uid", &fields.uid, 36)?;
    bounded("contract_id", &fields.contract_id, 36)?;
    bounded("issuer", &fields.issuer, 64)?;
    optional_bounded("visual_number", fields.visual_number.as_deref(), 64)?;
    optional_bounded("group_id", fields.group_id.as_deref(), 36)?;
    if let Some(language) = fields.language.as_deref() {
        exact_ascii("language", language, 2)?;
    }
    Ok(())
}

/// Validate a credentials object received from a peer.
///
/// The first role carries the identity the peer is registered under, so at
/// least one role is required.
pub fn validate_credentials(credentials: &Credentials) -> Result<(), ValidationError> {
    bounded("token", &credentials.token, 64)?;
    bounded("url", &credentials.url, 255)?;
    if !(credentials.url.starts_with("http://") || credentials.url.starts_with("https://")) {
        return Err(ValidationError::Invalid {
            field: "url",
            reason: "must be an absolute http(s) URL".into(),
        });
    }
    if credentials.roles.is_empty() {
        return Err(ValidationError::Empty("roles"));
    }
    for role in &credentials.roles {
        validate_identity(&role.country_code, &role.party_id)?;
        if let Some(details) = &role.business_details {
            bounded("business_details.name", &details.name, 100)?;
        }
    }
    Ok(())
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

fn optional_bounded(field: &'static str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}

fn exact_ascii(field: &'static str, value: &str, expected: usize) -> Result<(), ValidationError> {
    if value.len() != expected || !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::WrongLength { field, expected });
    }
    Ok(())
}
