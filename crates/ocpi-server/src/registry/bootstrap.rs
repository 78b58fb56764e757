//! Bootstrap token store
//!
//! Issues and consumes the single-use secrets (token A) that let a new peer
//! make its first credentials call. Secrets are returned once at issue time
//! and only their digests are kept.

use chrono::{Duration, Utc};
use ocpi_core::peer::ADMIN_DEACTIVATED;
use ocpi_core::{BootstrapToken, TokenCodec, UnusableReason, Usability};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::{BootstrapClaim, OcpiStore, StorageError};

/// Longest accepted lifetime for a bootstrap token
pub const MAX_EXPIRY_DAYS: i64 = 365;

#[derive(Error, Debug, Clone)]
pub enum BootstrapError {
    #[error("bootstrap token unusable: {0}")]
    Unusable(UnusableReason),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A freshly issued token together with its clear-text secret
#[derive(Debug, Clone, Serialize)]
pub struct IssuedBootstrapToken {
    #[serde(flatten)]
    pub token: BootstrapToken,
    /// Shown once; never stored
    pub secret: String,
}

pub struct BootstrapTokenStore {
    store: Arc<dyn OcpiStore>,
    codec: TokenCodec,
}

impl BootstrapTokenStore {
    pub fn new(store: Arc<dyn OcpiStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Issue a new token, optionally expiring after `expires_in_days`.
    ///
    /// Only 1 to 365 days sets an expiry; any other value issues a token that never expires.
    pub async fn issue(
        &self,
        description: Option<String>,
        expires_in_days: Option<i64>,
    ) -> Result<IssuedBootstrapToken, BootstrapError> {
        let now = Utc::now();
        let expires_at = match expires_in_days {
            Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => Some(now + Duration::days(days)),
            Some(_) | None => None,
        };

        let secret = TokenCodec::generate_token();
        let token = BootstrapToken {
            id: Uuid::new_v4(),
            secret_digest: self.codec.digest(&secret),
            description: description.filter(|d| !d.trim().is_empty()),
            expires_at,
            used_at: None,
            used_by: None,
            created_at: now,
        };
        self.store.insert_bootstrap_token(token.clone()).await?;

        info!(id = %token.id, expires_at = ?token.expires_at, "Issued bootstrap token");
        Ok(IssuedBootstrapToken { token, secret })
    }

    /// Whether `secret` can still be used to register
    pub async fn check_usable(&self, secret: &str) -> Result<Usability, StorageError> {
        let digest = self.codec.digest(secret);
        Ok(match self.store.find_bootstrap_token(&digest).await? {
            Some(token) => token.usability(Utc::now()),
            None => Usability::unusable(UnusableReason::NotFound),
        })
    }

    /// Reserve `secret` for a registration commit by `used_by`.
    ///
    /// Nothing is written; the claim is applied by the store together with
    /// the peer's registration, and fails there if the token was used meanwhile.
    pub async fn claim(&self, secret: &str, used_by: &str) -> Result<BootstrapClaim, BootstrapError> {
        let digest = self.codec.digest(secret);
        let token = self
            .store
            .find_bootstrap_token(&digest)
            .await?
            .ok_or(BootstrapError::Unusable(UnusableReason::NotFound))?;

        if let Some(reason) = token.usability(Utc::now()).reason {
            return Err(BootstrapError::Unusable(reason));
        }
        Ok(BootstrapClaim {
            token_id: token.id,
            used_by: used_by.to_string(),
        })
    }

    /// Mark `secret` used by `used_by`.
    ///
    /// Fails with the reason the token could not be consumed. Two concurrent
    /// calls with the same secret cannot both succeed.
    pub async fn consume(&self, secret: &str, used_by: &str) -> Result<(), BootstrapError> {
        let claim = self.claim(secret, used_by).await?;
        if !self
            .store
            .mark_bootstrap_token_used(claim.token_id, used_by, Utc::now())
            .await?
        {
            warn!(id = %claim.token_id, "Bootstrap token consumed concurrently");
            return Err(BootstrapError::Unusable(UnusableReason::AlreadyUsed));
        }

        info!(id = %claim.token_id, used_by = %used_by, "Consumed bootstrap token");
        Ok(())
    }

    /// Disable a token without deleting it.
    ///
    /// Returns false when no token has this id. Already-used tokens are left as they are.
    pub async fn deactivate(&self, id: Uuid) -> Result<bool, StorageError> {
        if self.store.get_bootstrap_token(id).await?.is_none() {
            return Ok(false);
        }
        if self
            .store
            .mark_bootstrap_token_used(id, ADMIN_DEACTIVATED, Utc::now())
            .await?
        {
            info!(id = %id, "Deactivated bootstrap token");
        }
        Ok(true)
    }

    /// Delete every expired token. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, StorageError> {
        let removed = self.store.delete_expired_bootstrap_tokens(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired bootstrap tokens");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<BootstrapToken>, StorageError> {
        self.store.list_bootstrap_tokens().await
    }

    /// Run `purge_expired` every `every` until the task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match self.purge_expired().await {
                    Ok(removed) => debug!(removed, "Bootstrap sweep finished"),
                    Err(e) => warn!(error = %e, "Bootstrap sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn tokens() -> BootstrapTokenStore {
        BootstrapTokenStore::new(Arc::new(MemoryStore::new()), TokenCodec::new())
    }

    #[tokio::test]
    async fn test_issue_and_consume() {
        let tokens = tokens();
        let issued = tokens.issue(Some("partner onboarding".into()), Some(7)).await.unwrap();
        assert_eq!(issued.secret.len(), 43);
        assert!(issued.token.expires_at.is_some());

        assert_eq!(tokens.check_usable(&issued.secret).await.unwrap(), Usability::usable());
        tokens.consume(&issued.secret, "NL-TST").await.unwrap();

        let usability = tokens.check_usable(&issued.secret).await.unwrap();
        assert_eq!(usability.reason, Some(UnusableReason::AlreadyUsed));

        let again = tokens.consume(&issued.secret, "NL-TST").await;
        assert!(matches!(again, Err(BootstrapError::Unusable(UnusableReason::AlreadyUsed))));
    }

    #[tokio::test]
    async fn test_unknown_secret() {
        let tokens = tokens();
        let usability = tokens.check_usable("never-issued").await.unwrap();
        assert_eq!(usability.reason, Some(UnusableReason::NotFound));
        assert!(matches!(
            tokens.consume("never-issued", "NL-TST").await,
            Err(BootstrapError::Unusable(UnusableReason::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_claim_does_not_consume() {
        let tokens = tokens();
        let issued = tokens.issue(None, None).await.unwrap();

        let claim = tokens.claim(&issued.secret, "NL-TST").await.unwrap();
        assert_eq!(claim.token_id, issued.token.id);
        assert_eq!(claim.used_by, "NL-TST");
        assert_eq!(tokens.check_usable(&issued.secret).await.unwrap(), Usability::usable());

        tokens.consume(&issued.secret, "NL-TST").await.unwrap();
        assert!(matches!(
            tokens.claim(&issued.secret, "NL-TST").await,
            Err(BootstrapError::Unusable(UnusableReason::AlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn test_expiry_bounds() {
        let tokens = tokens();
        for days in [0, -3, 366] {
            let issued = tokens.issue(None, Some(days)).await.unwrap();
            assert!(issued.token.expires_at.is_none(), "{days} days should not expire");
            assert_eq!(tokens.check_usable(&issued.secret).await.unwrap(), Usability::usable());
        }
        assert!(tokens.issue(None, Some(365)).await.unwrap().token.expires_at.is_some());
        assert!(tokens.issue(None, None).await.unwrap().token.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_deactivate() {
        let tokens = tokens();
        let issued = tokens.issue(None, None).await.unwrap();

        assert!(tokens.deactivate(issued.token.id).await.unwrap());
        assert!(!tokens.deactivate(Uuid::new_v4()).await.unwrap());

        let usability = tokens.check_usable(&issued.secret).await.unwrap();
        assert_eq!(usability.reason, Some(UnusableReason::AlreadyUsed));
        let listed = tokens.list().await.unwrap();
        assert_eq!(listed[0].used_by.as_deref(), Some(ADMIN_DEACTIVATED));
    }
}
