//! Redirect handlers for browser form logins.

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::AuthResult;
use crate::error::QrAuthError;
use crate::middleware::error::error_response;
use crate::types::{AuthenticationFailure, Principal};

use super::{AuthenticationEntryPoint, AuthenticationFailureHandler, AuthenticationSuccessHandler};

/// Redirects to a fixed URL after a successful login.
#[derive(Debug, Clone)]
pub struct RedirectSuccessHandler {
    target: String,
}

impl RedirectSuccessHandler {
    /// Creates a handler redirecting to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl AuthenticationSuccessHandler for RedirectSuccessHandler {
    async fn on_success(&self, _request: &Parts, _principal: &Principal) -> AuthResult<Response> {
        see_other(&self.target)
    }
}

/// Redirects to a fixed URL with the failure code in the `error` query
/// parameter.
#[derive(Debug, Clone)]
pub struct RedirectFailureHandler {
    target: String,
}

impl RedirectFailureHandler {
    /// Creates a handler redirecting to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl AuthenticationFailureHandler for RedirectFailureHandler {
    async fn on_failure(
        &self,
        _request: &Parts,
        failure: &AuthenticationFailure,
    ) -> AuthResult<Response> {
        see_other(&with_query(&self.target, "error", failure.code()))
    }
}

/// Redirects to a login page when authentication is aborted.
///
/// Server-side failures are still rendered as JSON errors; only
/// authentication problems redirect.
#[derive(Debug, Clone)]
pub struct RedirectEntryPoint {
    login_url: String,
}

impl RedirectEntryPoint {
    /// Creates an entry point redirecting to `login_url`.
    #[must_use]
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
        }
    }
}

#[async_trait]
impl AuthenticationEntryPoint for RedirectEntryPoint {
    async fn commence(&self, _request: &Parts, error: &QrAuthError) -> Response {
        if !error.is_client_error() {
            return error_response(error);
        }
        let target = with_query(&self.login_url, "error", error.error_code());
        see_other(&target).unwrap_or_else(|e| error_response(&e))
    }
}

fn see_other(location: &str) -> AuthResult<Response> {
    let location = HeaderValue::from_str(location)
        .map_err(|e| QrAuthError::handler(format!("invalid redirect location: {}", e)))?;
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
}

fn with_query(target: &str, key: &str, value: &str) -> String {
    let pair = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    let separator = if target.contains('?') { '&' } else { '?' };
    format!("{}{}{}", target, separator, pair)
}
