//! Success/failure handlers and entry points.
//!
//! The filter never builds a response itself. On success it calls an
//! [`AuthenticationSuccessHandler`], on failure an
//! [`AuthenticationFailureHandler`], and errors raised by either (or by
//! the session strategy) end up at an [`AuthenticationEntryPoint`].
//!
//! Several handlers of one kind can be combined in a [`HandlerRegistry`]
//! which picks the first one whose [`RequestMatcher`] matches.

pub mod json;
pub mod matcher;
pub mod redirect;
pub mod registry;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::response::Response;

use crate::AuthResult;
use crate::error::QrAuthError;
use crate::types::{AuthenticationFailure, Principal};

pub use json::{JsonEntryPoint, JsonFailureHandler, JsonSuccessHandler};
pub use matcher::RequestMatcher;
pub use redirect::{RedirectEntryPoint, RedirectFailureHandler, RedirectSuccessHandler};
pub use registry::HandlerRegistry;

/// Builds the response for a successful authentication.
#[async_trait]
pub trait AuthenticationSuccessHandler: Send + Sync {
    /// # Errors
    ///
    /// Errors propagate to the entry point.
    async fn on_success(&self, request: &Parts, principal: &Principal) -> AuthResult<Response>;
}

/// Builds the response for a failed authentication.
#[async_trait]
pub trait AuthenticationFailureHandler: Send + Sync {
    /// # Errors
    ///
    /// Errors propagate to the entry point.
    async fn on_failure(
        &self,
        request: &Parts,
        failure: &AuthenticationFailure,
    ) -> AuthResult<Response>;
}

/// Last-resort response for errors escaping the handlers.
#[async_trait]
pub trait AuthenticationEntryPoint: Send + Sync {
    /// Renders `error`. Must not fail.
    async fn commence(&self, request: &Parts, error: &QrAuthError) -> Response;
}
