//! JSON handlers for API and single-page clients.

use async_trait::async_trait;
use axum::Json;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::AuthResult;
use crate::error::QrAuthError;
use crate::middleware::error::{error_response, failure_response};
use crate::types::{AuthenticationFailure, Principal};

use super::{AuthenticationEntryPoint, AuthenticationFailureHandler, AuthenticationSuccessHandler};

/// Answers `200 OK` with the authenticated principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSuccessHandler;

#[async_trait]
impl AuthenticationSuccessHandler for JsonSuccessHandler {
    async fn on_success(&self, _request: &Parts, principal: &Principal) -> AuthResult<Response> {
        Ok(Json(json!({
            "authenticated": true,
            "principal": principal,
        }))
        .into_response())
    }
}

/// Answers with the failure's status (401 or 503) and error code.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFailureHandler;

#[async_trait]
impl AuthenticationFailureHandler for JsonFailureHandler {
    async fn on_failure(
        &self,
        _request: &Parts,
        failure: &AuthenticationFailure,
    ) -> AuthResult<Response> {
        Ok(failure_response(failure))
    }
}

/// Renders errors with the standard JSON error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntryPoint;

#[async_trait]
impl AuthenticationEntryPoint for JsonEntryPoint {
    async fn commence(&self, request: &Parts, error: &QrAuthError) -> Response {
        tracing::warn!(
            path = %request.uri.path(),
            error = %error,
            category = %error.category(),
            "QR authorization aborted"
        );
        error_response(error)
    }
}
