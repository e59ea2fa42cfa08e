//! In-memory storage backends.
//!
//! Tokens live in a `DashMap`. Every conditional update runs while holding
//! the entry's shard write lock (`get_mut`/`entry`), which makes
//! check-and-set atomic with respect to every other operation on the same
//! token. Expiry is applied lazily on read and eagerly by
//! [`CredentialStore::cleanup_expired`].

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::QrAuthError;
use crate::types::{Principal, QrToken};

use super::{CredentialStore, UserResolver};

/// Token store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tokens: DashMap<String, QrToken>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently held, including expired/consumed ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, token: &QrToken) -> AuthResult<()> {
        match self.tokens.entry(token.value.clone()) {
            Entry::Occupied(_) => Err(QrAuthError::storage("duplicate token value")),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, value: &str) -> AuthResult<Option<QrToken>> {
        Ok(self.tokens.get(value).map(|entry| entry.value().clone()))
    }

    async fn confirm(&self, value: &str, identity: &str) -> AuthResult<QrToken> {
        let mut entry = self
            .tokens
            .get_mut(value)
            .ok_or_else(|| QrAuthError::invalid_transition("token not found"))?;
        entry.confirm(identity, OffsetDateTime::now_utc())?;
        Ok(entry.value().clone())
    }

    async fn try_consume(&self, value: &str) -> AuthResult<bool> {
        let Some(mut entry) = self.tokens.get_mut(value) else {
            return Ok(false);
        };
        Ok(entry.consume(OffsetDateTime::now_utc()).is_ok())
    }

    async fn mark_expired(&self, value: &str) -> AuthResult<bool> {
        Ok(self
            .tokens
            .get_mut(value)
            .is_some_and(|mut entry| entry.expire()))
    }

    async fn remove(&self, value: &str) -> AuthResult<bool> {
        Ok(self.tokens.remove(value).is_some())
    }

    async fn cleanup_expired(&self, grace: Duration) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut evicted = 0u64;
        self.tokens.retain(|_, token| {
            let keep = !token.is_evictable_at(now, grace);
            if !keep {
                evicted += 1;
            }
            keep
        });
        Ok(evicted)
    }
}

/// User directory kept in process memory, keyed by principal id.
#[derive(Debug, Default)]
pub struct InMemoryUserResolver {
    principals: DashMap<String, Principal>,
}

impl InMemoryUserResolver {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with `principals`.
    #[must_use]
    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let resolver = Self::new();
        for principal in principals {
            resolver.insert(principal);
        }
        resolver
    }

    /// Adds or replaces a principal.
    pub fn insert(&self, principal: Principal) {
        self.principals.insert(principal.id.clone(), principal);
    }

    /// Removes a principal, e.g. when an account is deleted.
    pub fn remove(&self, id: &str) -> Option<Principal> {
        self.principals.remove(id).map(|(_, principal)| principal)
    }
}

#[async_trait]
impl UserResolver for InMemoryUserResolver {
    async fn resolve(&self, identity: &str) -> AuthResult<Option<Principal>> {
        Ok(self.principals.get(identity).map(|p| p.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::TokenState;

    fn token(value: &str, expires_in_secs: i64) -> QrToken {
        let now = OffsetDateTime::now_utc();
        QrToken::new(value, now, now + time::Duration::seconds(expires_in_secs))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryCredentialStore::new();
        store.insert(&token("T1", 60)).await.unwrap();

        let found = store.get("T1").await.unwrap().unwrap();
        assert_eq!(found.state, TokenState::Pending);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryCredentialStore::new();
        store.insert(&token("T1", 60)).await.unwrap();
        let err = store.insert(&token("T1", 60)).await.unwrap_err();
        assert!(matches!(err, QrAuthError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_confirm_then_consume_once() {
        let store = InMemoryCredentialStore::new();
        store.insert(&token("T1", 60)).await.unwrap();

        let confirmed = store.confirm("T1", "U1").await.unwrap();
        assert_eq!(confirmed.state, TokenState::Confirmed);
        assert_eq!(confirmed.identity.as_deref(), Some("U1"));

        assert!(store.try_consume("T1").await.unwrap());
        assert!(!store.try_consume("T1").await.unwrap());
        assert_eq!(
            store.get("T1").await.unwrap().unwrap().state,
            TokenState::Consumed
        );
    }

    #[tokio::test]
    async fn test_consume_requires_confirmation() {
        let store = InMemoryCredentialStore::new();
        store.insert(&token("T1", 60)).await.unwrap();
        assert!(!store.try_consume("T1").await.unwrap());
        assert!(!store.try_consume("unknown").await.unwrap());
        assert_eq!(
            store.get("T1").await.unwrap().unwrap().state,
            TokenState::Pending
        );
    }

    #[tokio::test]
    async fn test_consume_rejects_expired_confirmed_token() {
        let store = InMemoryCredentialStore::new();
        let mut expired = token("T1", -1);
        expired.state = TokenState::Confirmed;
        expired.identity = Some("U1".to_string());
        store.insert(&expired).await.unwrap();

        assert!(!store.try_consume("T1").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_unknown_token_fails() {
        let store = InMemoryCredentialStore::new();
        let err = store.confirm("nope", "U1").await.unwrap_err();
        assert!(matches!(err, QrAuthError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_mark_expired() {
        let store = InMemoryCredentialStore::new();
        store.insert(&token("T1", 60)).await.unwrap();
        assert!(store.mark_expired("T1").await.unwrap());
        assert!(!store.mark_expired("T1").await.unwrap());
        assert!(!store.mark_expired("unknown").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_evicts_only_stale_tokens() {
        let store = InMemoryCredentialStore::new();
        store.insert(&token("live", 60)).await.unwrap();
        store.insert(&token("fresh-expired", -5)).await.unwrap();
        store.insert(&token("stale", -600)).await.unwrap();

        let evicted = store
            .cleanup_expired(Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(store.len(), 2);
        assert!(store.get("stale").await.unwrap().is_none());
        assert!(store.get("fresh-expired").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_consume_has_single_winner() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store.insert(&token("T1", 60)).await.unwrap();
        store.confirm("T1", "U1").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.try_consume("T1").await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_user_resolver() {
        let resolver = InMemoryUserResolver::with_principals([Principal::new("U1", "alice")]);
        assert_eq!(
            resolver.resolve("U1").await.unwrap().map(|p| p.username),
            Some("alice".to_string())
        );

        resolver.remove("U1");
        assert!(resolver.resolve("U1").await.unwrap().is_none());
    }
}
