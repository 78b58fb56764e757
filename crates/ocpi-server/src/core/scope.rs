//! Tenant scoping
//!
//! Every peer-authenticated request carries a [`TenantContext`]. Data access
//! on behalf of that peer goes through a [`TenantScope`], which refuses to
//! read or write records owned by any other party.

use chrono::{DateTime, Utc};
use ocpi_core::{PartyIdentity, PhysicalToken, TokenType, ValidationError, WhitelistType};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::storage::{OcpiStore, StorageError};

/// The authenticated peer behind the current request
#[derive(Clone)]
pub struct TenantContext {
    pub peer_id: Uuid,
    pub identity: PartyIdentity,
    /// The token C the peer presented
    pub token: String,
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext")
            .field("peer_id", &self.peer_id)
            .field("identity", &self.identity)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug, Clone)]
pub enum ScopeError {
    #[error("{authenticated} may not access data of {requested}")]
    Forbidden {
        requested: String,
        authenticated: PartyIdentity,
    },

    #[error("{0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Partial token update. Only these transitions are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPatch {
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub whitelist: Option<WhitelistType>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct TenantScope<'a> {
    store: &'a dyn OcpiStore,
    ctx: &'a TenantContext,
}

impl<'a> TenantScope<'a> {
    pub fn new(store: &'a dyn OcpiStore, ctx: &'a TenantContext) -> Self {
        Self { store, ctx }
    }

    pub fn context(&self) -> &TenantContext {
        self.ctx
    }

    /// Reject a request that names a party other than the authenticated one
    pub fn ensure_owner(&self, country_code: &str, party_id: &str) -> Result<(), ScopeError> {
        if self.ctx.identity.matches(country_code, party_id) {
            return Ok(());
        }
        warn!(
            peer = %self.ctx.identity,
            requested = %format_args!("{}-{}", country_code, party_id),
            "Cross-tenant access refused"
        );
        Err(ScopeError::Forbidden {
            requested: format!("{}-{}", country_code, party_id).to_ascii_uppercase(),
            authenticated: self.ctx.identity.clone(),
        })
    }

    pub async fn get_token(
        &self,
        country_code: &str,
        party_id: &str,
        uid: &str,
        token_type: TokenType,
    ) -> Result<Option<PhysicalToken>, ScopeError> {
        self.ensure_owner(country_code, party_id)?;
        Ok(self
            .store
            .get_physical_token(&self.ctx.identity, uid, token_type)
            .await?)
    }

    /// Store a full token object pushed to `/{country_code}/{party_id}/{uid}`.
    ///
    /// The body must describe the same token the path names.
    pub async fn put_token(
        &self,
        country_code: &str,
        party_id: &str,
        uid: &str,
        token: PhysicalToken,
    ) -> Result<(), ScopeError> {
        self.ensure_owner(country_code, party_id)?;
        if token.owner() != self.ctx.identity {
            return Err(ScopeError::Forbidden {
                requested: token.owner().to_string(),
                authenticated: self.ctx.identity.clone(),
            });
        }
        if token.uid() != uid {
            return Err(ScopeError::InvalidParameters(format!(
                "uid in body ({}) does not match the path ({})",
                token.uid(),
                uid
            )));
        }
        Ok(self.store.put_physical_token(token).await?)
    }

    /// Apply a partial update. Returns `None` when the token does not exist.
    pub async fn patch_token(
        &self,
        country_code: &str,
        party_id: &str,
        uid: &str,
        token_type: TokenType,
        patch: TokenPatch,
    ) -> Result<Option<PhysicalToken>, ScopeError> {
        self.ensure_owner(country_code, party_id)?;
        if patch.valid.is_none() && patch.whitelist.is_none() {
            return Err(ScopeError::InvalidParameters(
                "patch must change valid or whitelist".into(),
            ));
        }
        if patch.valid == Some(true) {
            return Err(ScopeError::InvalidParameters(
                "a token can only be re-validated with a full PUT".into(),
            ));
        }

        let Some(mut token) = self
            .store
            .get_physical_token(&self.ctx.identity, uid, token_type)
            .await?
        else {
            return Ok(None);
        };

        let now = patch.last_updated.unwrap_or_else(Utc::now);
        if patch.valid == Some(false) {
            token = token.invalidate(now)?;
        }
        if let Some(whitelist) = patch.whitelist {
            token = token.update_whitelist(whitelist, now)?;
        }

        self.store.put_physical_token(token.clone()).await?;
        Ok(Some(token))
    }
}
