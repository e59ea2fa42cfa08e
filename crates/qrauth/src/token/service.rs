//! Token service for issuing, confirming and sweeping QR tokens.
//!
//! # Usage
//!
//! ```ignore
//! use qrauth::token::TokenService;
//!
//! let service = Arc::new(TokenService::from_config(store, &config.token));
//! let token = service.issue().await?;
//! // ... second device scans the QR code ...
//! service.confirm(&token.value, "user-42").await?;
//!
//! let sweeper = service.clone().spawn_sweeper(config.store.sweep_interval);
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::AuthResult;
use crate::config::TokenConfig;
use crate::error::QrAuthError;
use crate::storage::CredentialStore;
use crate::types::{QrToken, TokenState};

/// Issues and manages QR tokens.
pub struct TokenService {
    /// Authoritative token storage.
    store: Arc<dyn CredentialStore>,

    /// Lifetime of freshly issued tokens.
    ttl: Duration,

    /// How long expired/consumed tokens are retained before eviction.
    grace_period: Duration,
}

impl TokenService {
    /// Creates a new token service.
    ///
    /// # Arguments
    ///
    /// * `store` - Credential store receiving the tokens
    /// * `ttl` - Validity window of issued tokens
    /// * `grace_period` - Retention of expired/consumed tokens
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration, grace_period: Duration) -> Self {
        Self {
            store,
            ttl,
            grace_period,
        }
    }

    /// Creates a token service from the `token` configuration section.
    #[must_use]
    pub fn from_config(store: Arc<dyn CredentialStore>, config: &TokenConfig) -> Self {
        Self::new(store, config.ttl, config.grace_period)
    }

    /// Returns the configured token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a new `Pending` token and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored.
    pub async fn issue(&self) -> AuthResult<QrToken> {
        let token = QrToken::issue(self.ttl)?;
        self.store.insert(&token).await?;

        tracing::debug!(
            token = %QrToken::fingerprint(&token.value),
            expires_at = %token.expires_at,
            "Issued QR token"
        );
        Ok(token)
    }

    /// Binds `identity` to a pending token.
    ///
    /// Called by the confirmation flow once the second device has
    /// authenticated the user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the identity is blank or the token is
    /// unknown, expired, already confirmed or consumed; a storage error if the
    /// store fails.
    pub async fn confirm(&self, value: &str, identity: &str) -> AuthResult<QrToken> {
        if identity.trim().is_empty() {
            return Err(QrAuthError::invalid_transition(
                "confirming identity must not be empty",
            ));
        }

        let token = self.store.confirm(value, identity).await?;
        tracing::info!(
            token = %QrToken::fingerprint(value),
            identity = %identity,
            "QR token confirmed"
        );
        Ok(token)
    }

    /// Returns the effective state of a token, or `None` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn status(&self, value: &str) -> AuthResult<Option<TokenState>> {
        Ok(self
            .store
            .get(value)
            .await?
            .map(|token| token.effective_state()))
    }

    /// Evicts tokens that expired or were consumed more than the grace
    /// period ago.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn sweep(&self) -> AuthResult<u64> {
        let evicted = self.store.cleanup_expired(self.grace_period).await?;
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale QR tokens");
        }
        Ok(evicted)
    }

    /// Spawns a background task calling [`sweep`](Self::sweep) every
    /// `interval`.
    ///
    /// Sweep failures are logged and the task keeps running. Abort the
    /// returned handle to stop it.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        self.spawn_sweeper_with(interval, || {})
    }

    /// Like [`spawn_sweeper`](Self::spawn_sweeper), also running `on_tick`
    /// after every token sweep. Used to evict sessions and remember-me
    /// logins on the same schedule.
    pub fn spawn_sweeper_with<F>(self: Arc<Self>, interval: Duration, on_tick: F) -> JoinHandle<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        tracing::info!(interval = ?interval, "Starting QR token sweeper");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::warn!(error = %e, "QR token sweep failed");
                }
                on_tick();
            }
        })
    }
}
