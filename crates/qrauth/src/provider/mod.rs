//! Authentication providers.
//!
//! A provider turns an [`AuthorizationRequestContext`] into an
//! [`AuthenticationOutcome`]. The [`AuthenticationManager`] holds providers
//! in registration order and delegates to the first one that supports the
//! request.

pub mod qrcode;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FailureKind;
use crate::types::{AuthenticationOutcome, AuthorizationRequestContext};

pub use qrcode::QrAuthorizationProvider;

/// A pluggable authentication mechanism.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Returns `true` if this provider can authenticate the request.
    fn supports(&self, context: &AuthorizationRequestContext) -> bool;

    /// Authenticates the request.
    ///
    /// Infrastructure failures are reported as a `ServiceUnavailable`
    /// failure, never as a panic or an aborted request.
    async fn authenticate(&self, context: &AuthorizationRequestContext) -> AuthenticationOutcome;
}

/// Ordered list of providers.
#[derive(Clone, Default)]
pub struct AuthenticationManager {
    providers: Vec<Arc<dyn AuthenticationProvider>>,
}

impl AuthenticationManager {
    /// Creates a manager without providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider. Providers are consulted in registration order.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Authenticates with the first provider that supports the request.
    ///
    /// If no provider supports it, the request fails with
    /// `InvalidCredential`.
    pub async fn authenticate(&self, context: &AuthorizationRequestContext) -> AuthenticationOutcome {
        match self.providers.iter().find(|p| p.supports(context)) {
            Some(provider) => {
                tracing::trace!(provider = provider.name(), "Delegating authentication");
                provider.authenticate(context).await
            }
            None => {
                tracing::debug!(path = %context.path, "No authentication provider supports request");
                AuthenticationOutcome::failure_with(
                    FailureKind::InvalidCredential,
                    "No authentication provider supports this request",
                )
            }
        }
    }
}

impl std::fmt::Debug for AuthenticationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationManager")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenSource;
    use crate::types::Principal;

    struct FixedProvider {
        name: &'static str,
        source: Option<TokenSource>,
    }

    #[async_trait]
    impl AuthenticationProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, context: &AuthorizationRequestContext) -> bool {
            context.source == self.source
        }

        async fn authenticate(&self, _context: &AuthorizationRequestContext) -> AuthenticationOutcome {
            AuthenticationOutcome::Success(Principal::new(self.name, self.name))
        }
    }

    #[tokio::test]
    async fn test_first_supporting_provider_wins() {
        let manager = AuthenticationManager::new()
            .with_provider(Arc::new(FixedProvider {
                name: "cookie-only",
                source: Some(TokenSource::Cookie),
            }))
            .with_provider(Arc::new(FixedProvider {
                name: "header-a",
                source: Some(TokenSource::Header),
            }))
            .with_provider(Arc::new(FixedProvider {
                name: "header-b",
                source: Some(TokenSource::Header),
            }));

        let context = AuthorizationRequestContext::new("/login/qrcode", "T1", TokenSource::Header);
        let outcome = manager.authenticate(&context).await;
        assert_eq!(outcome.principal().map(|p| p.id.as_str()), Some("header-a"));
    }

    #[tokio::test]
    async fn test_unsupported_request_fails() {
        let manager = AuthenticationManager::new().with_provider(Arc::new(FixedProvider {
            name: "cookie-only",
            source: Some(TokenSource::Cookie),
        }));

        let context = AuthorizationRequestContext::without_token("/login/qrcode");
        let outcome = manager.authenticate(&context).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidCredential));
        assert!(AuthenticationManager::new().is_empty());
    }
}
