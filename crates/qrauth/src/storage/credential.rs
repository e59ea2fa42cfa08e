//! Credential store trait.
//!
//! The store is the single source of truth for token state. All state
//! changes go through conditional operations so that racing requests can
//! never both observe a successful login for the same token.
//!
//! # Security Considerations
//!
//! - Never log token values; use [`QrToken::fingerprint`] instead
//! - `try_consume` must be a single atomic conditional update
//! - Expired and consumed tokens should be evicted periodically

use std::time::Duration;

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::QrToken;

/// Storage trait for QR tokens.
///
/// # Example Implementation
///
/// ```ignore
/// use qrauth::storage::CredentialStore;
///
/// struct PgCredentialStore { pool: PgPool }
///
/// #[async_trait::async_trait]
/// impl CredentialStore for PgCredentialStore {
///     async fn try_consume(&self, value: &str) -> AuthResult<bool> {
///         let rows = sqlx::query(
///             "UPDATE qr_tokens SET state = 'consumed', consumed_at = NOW() \
///              WHERE value = $1 AND state = 'confirmed' AND expires_at > NOW()",
///         )
///         .bind(value)
///         .execute(&self.pool)
///         .await?
///         .rows_affected();
///         Ok(rows == 1)
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists a newly issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if a token with the same value already exists or the
    /// storage operation fails.
    async fn insert(&self, token: &QrToken) -> AuthResult<()>;

    /// Looks up a token by value.
    ///
    /// Returns the stored record regardless of its state; callers apply
    /// expiry via [`QrToken::effective_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, value: &str) -> AuthResult<Option<QrToken>>;

    /// Atomically binds `identity` to a `Pending`, unexpired token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the token is unknown or not `Pending`,
    /// or a storage error if the operation fails.
    async fn confirm(&self, value: &str, identity: &str) -> AuthResult<QrToken>;

    /// Atomically transitions a `Confirmed`, unexpired token to `Consumed`.
    ///
    /// # Returns
    ///
    /// `true` if this call performed the transition; `false` if the token is
    /// unknown, not confirmed, expired or was already consumed.
    ///
    /// # Atomicity
    ///
    /// Implementations must check and update in one step (compare-and-swap,
    /// or a conditional `UPDATE ... WHERE state = 'confirmed'`). A
    /// read-then-write sequence is not acceptable.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn try_consume(&self, value: &str) -> AuthResult<bool>;

    /// Rewrites a `Pending`/`Confirmed` token to `Expired`.
    ///
    /// Returns `true` if the stored state changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_expired(&self, value: &str) -> AuthResult<bool>;

    /// Removes a token regardless of state.
    ///
    /// Returns `true` if a token was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove(&self, value: &str) -> AuthResult<bool>;

    /// Evicts tokens whose expiry or consumption lies more than `grace` in
    /// the past.
    ///
    /// # Returns
    ///
    /// The number of evicted tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self, grace: Duration) -> AuthResult<u64>;
}
