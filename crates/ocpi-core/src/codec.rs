//! Token generation, Authorization header encoding and at-rest digests
//!
//! Bearer tokens are 256 random bits rendered as URL-safe base64. On the
//! wire OCPI 2.2.1 wraps the token once more: the header value is
//! `Token <base64(token)>`. Tokens are never stored in the clear on our
//! side; only `digest(token)` is persisted and lookups go through it.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Authorization scheme prefix
pub const SCHEME: &str = "Token ";

/// Number of random bytes in a generated token
pub const TOKEN_BYTES: usize = 32;

/// Codec for bearer tokens
///
/// Holds the optional server-side digest secret and whether header values
/// that are not base64 are accepted as literal tokens (peers older than
/// 2.2.1 send the raw token).
#[derive(Clone)]
pub struct TokenCodec {
    digest_secret: Option<Vec<u8>>,
    accept_legacy_plain: bool,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keyed", &self.digest_secret.is_some())
            .field("accept_legacy_plain", &self.accept_legacy_plain)
            .finish()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCodec {
    /// Unkeyed codec (plain SHA-256 digests) accepting legacy plain headers
    pub fn new() -> Self {
        Self {
            digest_secret: None,
            accept_legacy_plain: true,
        }
    }

    /// Use HMAC-SHA-256 keyed with `secret` for digests
    pub fn with_digest_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        let secret = secret.into();
        self.digest_secret = if secret.is_empty() { None } else { Some(secret) };
        self
    }

    /// Accept or refuse header values that are not base64
    pub fn with_legacy_plain_tokens(mut self, accept: bool) -> Self {
        self.accept_legacy_plain = accept;
        self
    }

    /// Generate a fresh token from the OS CSPRNG
    pub fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// `Token <base64(token)>`
    pub fn to_authorization_header_value(token: &str) -> String {
        format!("{}{}", SCHEME, STANDARD.encode(token.as_bytes()))
    }

    /// Extract the token from an Authorization header value.
    ///
    /// `None` means no usable credential was supplied: missing scheme,
    /// empty value, or a non-base64 value while the legacy shim is off.
    pub fn from_authorization_header_value(&self, header: &str) -> Option<String> {
        let scheme = header.get(..SCHEME.len())?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return None;
        }
        let value = header[SCHEME.len()..].trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(decoded) = STANDARD.decode(value) {
            if !decoded.is_empty() && decoded.iter().all(|b| (0x20..=0x7e).contains(b)) {
                // printable ASCII is valid UTF-8
                return String::from_utf8(decoded).ok();
            }
        }

        if self.accept_legacy_plain && value.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            Some(value.to_string())
        } else {
            None
        }
    }

    /// Hex digest used to store and look up tokens
    pub fn digest(&self, token: &str) -> String {
        match &self.digest_secret {
            Some(secret) => {
                // HMAC accepts keys of any length
                let mut mac = match HmacSha256::new_from_slice(secret) {
                    Ok(mac) => mac,
                    Err(_) => return hex::encode(Sha256::digest(token.as_bytes())),
                };
                mac.update(token.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            None => hex::encode(Sha256::digest(token.as_bytes())),
        }
    }

    /// Recompute the digest of `token` and compare it in constant time
    pub fn verify(&self, token: &str, stored_digest_hex: &str) -> bool {
        let computed = self.digest(token);
        let computed = computed.as_bytes();
        let stored = stored_digest_hex.as_bytes();
        if computed.len() != stored.len() {
            return false;
        }
        computed.ct_eq(stored).into()
    }
}
