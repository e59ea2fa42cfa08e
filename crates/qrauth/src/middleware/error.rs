//! Error response rendering.
//!
//! Every error body has the same shape:
//!
//! ```json
//! { "error": "credential_reused", "message": "QR authorization token has already been used" }
//! ```
//!
//! 401 responses carry a `WWW-Authenticate` challenge naming the error code;
//! 503 responses carry `Retry-After`.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::QrAuthError;
use crate::types::AuthenticationFailure;

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "1";

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for QrAuthError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

/// Renders an infrastructure error without consuming it.
#[must_use]
pub fn error_response(error: &QrAuthError) -> Response {
    let (status, message) = error_details(error);
    json_error(status, error.error_code(), &message, error.is_transient())
}

/// Renders a credential failure: 401, or 503 for the transient kind.
#[must_use]
pub fn failure_response(failure: &AuthenticationFailure) -> Response {
    json_error(
        failure.kind.status_code(),
        failure.code(),
        &failure.detail,
        failure.kind.is_transient(),
    )
}

/// Builds the JSON error body.
#[must_use]
pub fn error_body(code: &str, message: &str) -> serde_json::Value {
    json!({
        "error": code,
        "message": message,
    })
}

/// Extracts (HTTP status, client-facing message) from an error.
///
/// Internal details of server-side failures are not exposed.
fn error_details(error: &QrAuthError) -> (StatusCode, String) {
    match error {
        QrAuthError::Storage { .. } | QrAuthError::Timeout { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Authentication service is temporarily unavailable".to_string(),
        ),
        QrAuthError::InvalidTransition { message } => (StatusCode::CONFLICT, message.clone()),
        QrAuthError::Unauthenticated { message } => (StatusCode::UNAUTHORIZED, message.clone()),
        QrAuthError::Configuration { .. }
        | QrAuthError::Handler { .. }
        | QrAuthError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

fn json_error(status: StatusCode, code: &str, message: &str, transient: bool) -> Response {
    let mut headers = HeaderMap::new();

    if status == StatusCode::UNAUTHORIZED {
        let www_auth = build_www_authenticate_header(code, message);
        if let Ok(value) = HeaderValue::from_str(&www_auth) {
            headers.insert(header::WWW_AUTHENTICATE, value);
        }
    }
    if transient && status == StatusCode::SERVICE_UNAVAILABLE {
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from_static(RETRY_AFTER_SECS),
        );
    }

    (status, headers, Json(error_body(code, message))).into_response()
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `QrCode realm="qrauth", error="credential_expired", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('\"', "\\\"");
    format!(
        "QrCode realm=\"qrauth\", error=\"{}\", error_description=\"{}\"",
        error, escaped_desc
    )
}
