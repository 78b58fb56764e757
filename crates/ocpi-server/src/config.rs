//! Server configuration
//!
//! Read from environment variables at startup. `from_lookup` takes the
//! lookup function explicitly so tests do not touch the process environment.

use ocpi_core::{BusinessDetails, CredentialsRole, PartyIdentity, Role, TokenCodec};
use std::time::Duration;
use thiserror::Error;

use crate::api::paths;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally reachable base URL, without trailing slash
    pub public_url: String,
    pub country_code: String,
    pub party_id: String,
    pub role: Role,
    pub business_name: String,
    pub business_website: Option<String>,
    /// Key for HMAC token digests; plain SHA-256 when unset
    pub token_hash_secret: Option<String>,
    /// Key required on `/admin` routes; admin routes are closed when unset
    pub admin_key: Option<String>,
    /// Accept Authorization values that are not base64 (pre-2.2.1 peers)
    pub accept_legacy_tokens: bool,
    pub negotiation_timeout: Duration,
    pub bootstrap_sweep_interval: Duration,
    pub log_level: String,
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("public_url", &self.public_url)
            .field("party", &format_args!("{}-{}", self.country_code, self.party_id))
            .field("role", &self.role)
            .field("accept_legacy_tokens", &self.accept_legacy_tokens)
            .field("negotiation_timeout", &self.negotiation_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            public_url: "http://localhost:8080".into(),
            country_code: "NL".into(),
            party_id: "CPO".into(),
            role: Role::Cpo,
            business_name: "OCPI Credentials Plane".into(),
            business_website: None,
            token_hash_secret: None,
            admin_key: None,
            accept_legacy_tokens: true,
            negotiation_timeout: Duration::from_secs(10),
            bootstrap_sweep_interval: Duration::from_secs(3600),
            log_level: "info".into(),
            database_url: None,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("OCPI_PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "OCPI_PORT",
                message: format!("'{}' is not a port number", v),
            })?,
            None => defaults.port,
        };

        let public_url = get("OCPI_PUBLIC_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let country_code = get("OCPI_COUNTRY_CODE").unwrap_or(defaults.country_code);
        let party_id = get("OCPI_PARTY_ID").unwrap_or(defaults.party_id);
        ocpi_core::validation::validate_identity(&country_code, &party_id).map_err(|e| {
            ConfigError::Invalid {
                var: "OCPI_COUNTRY_CODE/OCPI_PARTY_ID",
                message: e.to_string(),
            }
        })?;

        let role = match get("OCPI_ROLE") {
            Some(v) => v.parse().map_err(|message| ConfigError::Invalid { var: "OCPI_ROLE", message })?,
            None => defaults.role,
        };

        let accept_legacy_tokens = match get("OCPI_ACCEPT_LEGACY_TOKENS") {
            Some(v) => parse_bool("OCPI_ACCEPT_LEGACY_TOKENS", &v)?,
            None => defaults.accept_legacy_tokens,
        };

        let negotiation_timeout = match get("OCPI_NEGOTIATION_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_secs("OCPI_NEGOTIATION_TIMEOUT_SECS", &v)?),
            None => defaults.negotiation_timeout,
        };

        let bootstrap_sweep_interval = match get("OCPI_BOOTSTRAP_SWEEP_SECS") {
            Some(v) => Duration::from_secs(parse_secs("OCPI_BOOTSTRAP_SWEEP_SECS", &v)?),
            None => defaults.bootstrap_sweep_interval,
        };

        Ok(Self {
            port,
            public_url,
            country_code: country_code.to_ascii_uppercase(),
            party_id: party_id.to_ascii_uppercase(),
            role,
            business_name: get("OCPI_BUSINESS_NAME").unwrap_or(defaults.business_name),
            business_website: get("OCPI_BUSINESS_WEBSITE"),
            token_hash_secret: get("OCPI_TOKEN_HASH_SECRET"),
            admin_key: get("OCPI_ADMIN_KEY"),
            accept_legacy_tokens,
            negotiation_timeout,
            bootstrap_sweep_interval,
            log_level: get("OCPI_LOG_LEVEL").unwrap_or(defaults.log_level),
            database_url: get("DATABASE_URL"),
        })
    }

    /// Our own versions discovery URL, handed to peers in credentials
    pub fn versions_url(&self) -> String {
        format!("{}{}", self.public_url, paths::VERSIONS)
    }

    pub fn version_details_url(&self) -> String {
        format!("{}{}", self.public_url, paths::VERSION_DETAILS)
    }

    /// Absolute URL of one of our 2.2.1 module endpoints
    pub fn module_url(&self, module: &str) -> String {
        format!("{}/{}", self.version_details_url(), module)
    }

    pub fn identity(&self) -> PartyIdentity {
        PartyIdentity::new(&self.country_code, &self.party_id)
    }

    /// Roles we declare in our own credentials object
    pub fn own_roles(&self) -> Vec<CredentialsRole> {
        vec![CredentialsRole {
            role: self.role,
            business_details: Some(BusinessDetails {
                name: self.business_name.clone(),
                website: self.business_website.clone(),
                logo: None,
            }),
            party_id: self.party_id.clone(),
            country_code: self.country_code.clone(),
        }]
    }

    pub fn token_codec(&self) -> TokenCodec {
        let codec = TokenCodec::new().with_legacy_plain_tokens(self.accept_legacy_tokens);
        match &self.token_hash_secret {
            Some(secret) => codec.with_digest_secret(secret.as_bytes()),
            None => codec,
        }
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::Invalid {
            var,
            message: format!("'{}' is not a positive number of seconds", value),
        }),
    }
}
