//! QR-code authorization provider.
//!
//! Validates a presented token against the credential store:
//!
//! | Stored/effective state | Outcome                                   |
//! |------------------------|-------------------------------------------|
//! | absent token           | `MissingCredential`                       |
//! | unknown                | `InvalidCredential`                       |
//! | `Pending`              | `NotYetConfirmed` (state unchanged)       |
//! | `Expired`              | `CredentialExpired`                       |
//! | `Consumed`             | `CredentialReused`                        |
//! | `Confirmed`            | consume, resolve principal, `Success`     |
//!
//! The consume-and-resolve step runs on a detached task: if the request
//! future is dropped mid-flight the transition still completes or never
//! starts, and the outcome is simply discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::{FailureKind, QrAuthError};
use crate::storage::{CredentialStore, UserResolver};
use crate::types::{AuthenticationOutcome, AuthorizationRequestContext, QrToken, TokenState};

use super::AuthenticationProvider;

/// Default bound on each store/resolver call.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Provider validating QR tokens.
#[derive(Clone)]
pub struct QrAuthorizationProvider {
    store: Arc<dyn CredentialStore>,
    resolver: Arc<dyn UserResolver>,
    lookup_timeout: Duration,
}

impl QrAuthorizationProvider {
    /// Creates a provider with the default lookup timeout.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, resolver: Arc<dyn UserResolver>) -> Self {
        Self {
            store,
            resolver,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Sets the bound applied to every store/resolver call.
    #[must_use]
    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Validates a token value.
    pub async fn validate(&self, token: Option<&str>) -> AuthenticationOutcome {
        let Some(value) = token.map(str::trim).filter(|v| !v.is_empty()) else {
            tracing::debug!("No QR token presented");
            return AuthenticationOutcome::failure(FailureKind::MissingCredential);
        };
        let fingerprint = QrToken::fingerprint(value);

        let record = match bounded(self.lookup_timeout, "credential lookup", self.store.get(value))
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(token = %fingerprint, "Unknown QR token");
                return AuthenticationOutcome::failure(FailureKind::InvalidCredential);
            }
            Err(e) => return unavailable(&fingerprint, &e),
        };

        // Time decides before stored state: an expired window wins even over
        // a consumed token. The stored state itself is never rewound.
        if record.is_expired_at(OffsetDateTime::now_utc()) {
            tracing::debug!(token = %fingerprint, state = %record.state, "QR token expired");
            if !record.state.is_terminal() {
                self.expire_quietly(value, &fingerprint).await;
            }
            return AuthenticationOutcome::failure(FailureKind::CredentialExpired);
        }

        match record.state {
            TokenState::Pending => {
                tracing::debug!(token = %fingerprint, "QR token not confirmed yet");
                AuthenticationOutcome::failure(FailureKind::NotYetConfirmed)
            }
            TokenState::Expired => {
                tracing::debug!(token = %fingerprint, "QR token expired");
                AuthenticationOutcome::failure(FailureKind::CredentialExpired)
            }
            TokenState::Consumed => {
                tracing::warn!(token = %fingerprint, "Replay of consumed QR token");
                AuthenticationOutcome::failure(FailureKind::CredentialReused)
            }
            TokenState::Confirmed => self.consume_and_resolve(record, fingerprint).await,
        }
    }

    async fn consume_and_resolve(&self, record: QrToken, fingerprint: String) -> AuthenticationOutcome {
        let Some(identity) = record.identity.clone() else {
            tracing::warn!(token = %fingerprint, "Confirmed QR token has no bound identity");
            return AuthenticationOutcome::failure_with(
                FailureKind::PrincipalNotFound,
                "Confirmed token carries no identity",
            );
        };

        let store = self.store.clone();
        let resolver = self.resolver.clone();
        let lookup_timeout = self.lookup_timeout;
        let task_fingerprint = fingerprint.clone();

        let task = tokio::spawn(async move {
            let fingerprint = task_fingerprint;
            match bounded(lookup_timeout, "token consumption", store.try_consume(&record.value))
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    // Lost the race, or the window closed since the lookup
                    if record.is_expired_at(OffsetDateTime::now_utc()) {
                        tracing::debug!(token = %fingerprint, "QR token expired before consumption");
                        return AuthenticationOutcome::failure(FailureKind::CredentialExpired);
                    }
                    tracing::warn!(token = %fingerprint, "QR token consumed by a concurrent request");
                    return AuthenticationOutcome::failure(FailureKind::CredentialReused);
                }
                Err(e) => return unavailable(&fingerprint, &e),
            }

            match bounded(lookup_timeout, "principal resolution", resolver.resolve(&identity)).await
            {
                Ok(Some(principal)) => {
                    tracing::info!(
                        token = %fingerprint,
                        user = %principal.username,
                        "QR login succeeded"
                    );
                    AuthenticationOutcome::Success(principal)
                }
                Ok(None) => {
                    tracing::warn!(token = %fingerprint, identity = %identity, "Confirmed identity not found");
                    AuthenticationOutcome::failure(FailureKind::PrincipalNotFound)
                }
                Err(e) => unavailable(&fingerprint, &e),
            }
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(token = %fingerprint, error = %e, "QR token validation task failed");
                AuthenticationOutcome::failure(FailureKind::ServiceUnavailable)
            }
        }
    }

    async fn expire_quietly(&self, value: &str, fingerprint: &str) {
        if let Err(e) = bounded(self.lookup_timeout, "token expiry", self.store.mark_expired(value)).await {
            tracing::debug!(token = %fingerprint, error = %e, "Failed to mark QR token expired");
        }
    }
}

#[async_trait]
impl AuthenticationProvider for QrAuthorizationProvider {
    fn name(&self) -> &str {
        "qrcode"
    }

    fn supports(&self, _context: &AuthorizationRequestContext) -> bool {
        true
    }

    async fn authenticate(&self, context: &AuthorizationRequestContext) -> AuthenticationOutcome {
        self.validate(context.token.as_deref()).await
    }
}

async fn bounded<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = AuthResult<T>>,
) -> AuthResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| QrAuthError::timeout(operation))?
}

fn unavailable(fingerprint: &str, error: &QrAuthError) -> AuthenticationOutcome {
    tracing::warn!(
        token = %fingerprint,
        error = %error,
        category = %error.category(),
        "QR token validation unavailable"
    );
    AuthenticationOutcome::failure_with(error.failure_kind(), error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryCredentialStore, InMemoryUserResolver};
    use crate::types::Principal;

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        resolver: Arc<InMemoryUserResolver>,
        provider: QrAuthorizationProvider,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        let resolver = Arc::new(InMemoryUserResolver::with_principals([Principal::new(
            "U1", "alice",
        )
        .with_authority("ROLE_USER")]));
        let provider = QrAuthorizationProvider::new(store.clone(), resolver.clone());
        Fixture {
            store,
            resolver,
            provider,
        }
    }

    async fn insert(store: &InMemoryCredentialStore, value: &str, expires_in_secs: i64) {
        let now = OffsetDateTime::now_utc();
        store
            .insert(&QrToken::new(
                value,
                now,
                now + time::Duration::seconds(expires_in_secs),
            ))
            .await
            .unwrap();
    }

    async fn stored_state(store: &InMemoryCredentialStore, value: &str) -> TokenState {
        store.get(value).await.unwrap().unwrap().state
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn insert(&self, _token: &QrToken) -> AuthResult<()> {
            Err(QrAuthError::storage("connection refused"))
        }
        async fn get(&self, _value: &str) -> AuthResult<Option<QrToken>> {
            Err(QrAuthError::storage("connection refused"))
        }
        async fn confirm(&self, _value: &str, _identity: &str) -> AuthResult<QrToken> {
            Err(QrAuthError::storage("connection refused"))
        }
        async fn try_consume(&self, _value: &str) -> AuthResult<bool> {
            Err(QrAuthError::storage("connection refused"))
        }
        async fn mark_expired(&self, _value: &str) -> AuthResult<bool> {
            Err(QrAuthError::storage("connection refused"))
        }
        async fn remove(&self, _value: &str) -> AuthResult<bool> {
            Err(QrAuthError::storage("connection refused"))
        }
        async fn cleanup_expired(&self, _grace: Duration) -> AuthResult<u64> {
            Err(QrAuthError::storage("connection refused"))
        }
    }

    struct SlowResolver;

    #[async_trait]
    impl UserResolver for SlowResolver {
        async fn resolve(&self, identity: &str) -> AuthResult<Option<Principal>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(Principal::new(identity, identity)))
        }
    }

    #[tokio::test]
    async fn test_missing_and_blank_tokens() {
        let f = fixture();
        assert_eq!(
            f.provider.validate(None).await.failure_kind(),
            Some(FailureKind::MissingCredential)
        );
        assert_eq!(
            f.provider.validate(Some("   ")).await.failure_kind(),
            Some(FailureKind::MissingCredential)
        );
    }

    #[tokio::test]
    async fn test_never_issued_token_is_invalid() {
        let f = fixture();
        assert_eq!(
            f.provider.validate(Some("never-issued")).await.failure_kind(),
            Some(FailureKind::InvalidCredential)
        );
    }

    #[tokio::test]
    async fn test_pending_token_stays_pending() {
        let f = fixture();
        insert(&f.store, "T1", 60).await;

        let outcome = f.provider.validate(Some("T1")).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NotYetConfirmed));
        assert_eq!(stored_state(&f.store, "T1").await, TokenState::Pending);
    }

    #[tokio::test]
    async fn test_confirmed_token_succeeds_once() {
        let f = fixture();
        insert(&f.store, "T1", 60).await;
        f.store.confirm("T1", "U1").await.unwrap();

        let outcome = f.provider.validate(Some("T1")).await;
        let principal = outcome.principal().unwrap();
        assert_eq!(principal.id, "U1");
        assert!(principal.has_authority("ROLE_USER"));
        assert_eq!(stored_state(&f.store, "T1").await, TokenState::Consumed);

        for _ in 0..3 {
            assert_eq!(
                f.provider.validate(Some("T1")).await.failure_kind(),
                Some(FailureKind::CredentialReused)
            );
        }
    }

    #[tokio::test]
    async fn test_expired_token_regardless_of_prior_state() {
        let f = fixture();
        insert(&f.store, "pending", -1).await;

        let now = OffsetDateTime::now_utc();
        let mut confirmed = QrToken::new("confirmed", now, now - time::Duration::seconds(1));
        confirmed.state = TokenState::Confirmed;
        confirmed.identity = Some("U1".to_string());
        f.store.insert(&confirmed).await.unwrap();

        for value in ["pending", "confirmed"] {
            assert_eq!(
                f.provider.validate(Some(value)).await.failure_kind(),
                Some(FailureKind::CredentialExpired)
            );
            assert_eq!(stored_state(&f.store, value).await, TokenState::Expired);
        }
    }

    #[tokio::test]
    async fn test_consumed_token_past_expiry_is_expired() {
        let f = fixture();
        let now = OffsetDateTime::now_utc();
        let mut consumed = QrToken::new(
            "T1",
            now - time::Duration::minutes(7),
            now - time::Duration::minutes(5),
        );
        consumed.state = TokenState::Consumed;
        consumed.identity = Some("U1".to_string());
        consumed.consumed_at = Some(now - time::Duration::minutes(6));
        f.store.insert(&consumed).await.unwrap();

        assert_eq!(
            f.provider.validate(Some("T1")).await.failure_kind(),
            Some(FailureKind::CredentialExpired)
        );
        assert_eq!(stored_state(&f.store, "T1").await, TokenState::Consumed);
    }

    #[tokio::test]
    async fn test_deleted_account_is_principal_not_found() {
        let f = fixture();
        insert(&f.store, "T1", 60).await;
        f.store.confirm("T1", "U1").await.unwrap();
        f.resolver.remove("U1");

        assert_eq!(
            f.provider.validate(Some("T1")).await.failure_kind(),
            Some(FailureKind::PrincipalNotFound)
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_service_unavailable() {
        let provider =
            QrAuthorizationProvider::new(Arc::new(BrokenStore), Arc::new(InMemoryUserResolver::new()));

        let outcome = provider.validate(Some("T1")).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ServiceUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_timeout_is_service_unavailable() {
        let store = Arc::new(InMemoryCredentialStore::new());
        insert(&store, "T1", 600).await;
        store.confirm("T1", "U1").await.unwrap();

        let provider = QrAuthorizationProvider::new(store.clone(), Arc::new(SlowResolver))
            .with_lookup_timeout(Duration::from_millis(100));

        let outcome = provider.validate(Some("T1")).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ServiceUnavailable));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_validations_yield_single_success() {
        let f = fixture();
        insert(&f.store, "T1", 60).await;
        f.store.confirm("T1", "U1").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provider = f.provider.clone();
            handles.push(tokio::spawn(
                async move { provider.validate(Some("T1")).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            if outcome.is_success() {
                successes += 1;
            } else {
                assert_eq!(outcome.failure_kind(), Some(FailureKind::CredentialReused));
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_scenario_confirm_then_replay() {
        let f = fixture();
        // t0: issued
        insert(&f.store, "T1", 120).await;
        // t1: confirmed for U1
        f.store.confirm("T1", "U1").await.unwrap();
        // t2: login
        let outcome = f.provider.validate(Some("T1")).await;
        assert_eq!(outcome.principal().map(|p| p.id.as_str()), Some("U1"));
        assert_eq!(stored_state(&f.store, "T1").await, TokenState::Consumed);
        // t3: replay
        assert_eq!(
            f.provider.validate(Some("T1")).await.failure_kind(),
            Some(FailureKind::CredentialReused)
        );
    }

    #[tokio::test]
    async fn test_scenario_never_confirmed_then_expired() {
        let f = fixture();
        insert(&f.store, "T2", -30).await;

        assert_eq!(
            f.provider.validate(Some("T2")).await.failure_kind(),
            Some(FailureKind::CredentialExpired)
        );
    }

    #[tokio::test]
    async fn test_provider_trait_uses_context_token() {
        let f = fixture();
        let context = AuthorizationRequestContext::without_token("/login/qrcode");
        assert!(f.provider.supports(&context));
        assert_eq!(f.provider.name(), "qrcode");
        assert_eq!(
            f.provider.authenticate(&context).await.failure_kind(),
            Some(FailureKind::MissingCredential)
        );
    }
}
