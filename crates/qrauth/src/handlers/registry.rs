//! Matcher-based handler dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::response::Response;

use crate::AuthResult;
use crate::error::QrAuthError;
use crate::types::{AuthenticationFailure, Principal};

use super::{
    AuthenticationEntryPoint, AuthenticationFailureHandler, AuthenticationSuccessHandler,
    RequestMatcher,
};

/// Ordered `(matcher, handler)` table with a default.
///
/// Selection walks the table in registration order and returns the first
/// handler whose matcher matches; the default is used otherwise.
///
/// # Example
///
/// ```ignore
/// let failure: HandlerRegistry<dyn AuthenticationFailureHandler> =
///     HandlerRegistry::new(Arc::new(JsonFailureHandler))
///         .register(
///             RequestMatcher::not(RequestMatcher::AcceptsJson),
///             Arc::new(RedirectFailureHandler::new("/login")),
///         );
/// ```
pub struct HandlerRegistry<H: ?Sized> {
    entries: Vec<(RequestMatcher, Arc<H>)>,
    default: Arc<H>,
}

impl<H: ?Sized> HandlerRegistry<H> {
    /// Creates a registry with only a default handler.
    #[must_use]
    pub fn new(default: Arc<H>) -> Self {
        Self {
            entries: Vec::new(),
            default,
        }
    }

    /// Appends a handler used when `matcher` matches.
    #[must_use]
    pub fn register(mut self, matcher: RequestMatcher, handler: Arc<H>) -> Self {
        self.entries.push((matcher, handler));
        self
    }

    /// Selects the handler for `request`.
    #[must_use]
    pub fn select(&self, request: &Parts) -> &Arc<H> {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(request))
            .map_or(&self.default, |(_, handler)| handler)
    }

    /// Number of registered (non-default) handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if only the default handler is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AuthenticationSuccessHandler for HandlerRegistry<dyn AuthenticationSuccessHandler> {
    async fn on_success(&self, request: &Parts, principal: &Principal) -> AuthResult<Response> {
        self.select(request).on_success(request, principal).await
    }
}

#[async_trait]
impl AuthenticationFailureHandler for HandlerRegistry<dyn AuthenticationFailureHandler> {
    async fn on_failure(
        &self,
        request: &Parts,
        failure: &AuthenticationFailure,
    ) -> AuthResult<Response> {
        self.select(request).on_failure(request, failure).await
    }
}

#[async_trait]
impl AuthenticationEntryPoint for HandlerRegistry<dyn AuthenticationEntryPoint> {
    async fn commence(&self, request: &Parts, error: &QrAuthError) -> Response {
        self.select(request).commence(request, error).await
    }
}
