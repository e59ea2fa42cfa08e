//! QR token issuing and status endpoints.
//!
//! # Usage
//!
//! ```ignore
//! use qrauth::http::{TokenEndpointState, token_routes};
//!
//! let app = Router::new().merge(token_routes(TokenEndpointState::new(token_service)));
//! ```
//!
//! # Endpoints
//!
//! ```text
//! POST /qrcode/tokens           -> 201 {"token": "...", "state": "pending", "expiresAt": "...", "expiresIn": 120}
//! GET  /qrcode/tokens/{token}   -> 200 {"state": "confirmed"}
//! ```
//!
//! The token value is the content of the QR code. The page displaying it
//! polls the status endpoint and submits the token to the login path once
//! the state becomes `confirmed`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::{FailureKind, QrAuthError};
use crate::middleware::error::error_body;
use crate::token::TokenService;
use crate::types::{QrToken, TokenState};

// =============================================================================
// State Types
// =============================================================================

/// State required for the token endpoints.
#[derive(Clone)]
pub struct TokenEndpointState {
    /// Token service issuing and inspecting tokens.
    pub token_service: Arc<TokenService>,
}

impl TokenEndpointState {
    /// Creates a new endpoint state.
    pub fn new(token_service: Arc<TokenService>) -> Self {
        Self { token_service }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Response for a freshly issued token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTokenResponse {
    /// Value to encode into the QR code.
    pub token: String,
    /// Always `pending`.
    pub state: TokenState,
    /// Expiry timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Seconds until expiry.
    pub expires_in: u64,
}

impl From<QrToken> for IssuedTokenResponse {
    fn from(token: QrToken) -> Self {
        let expires_in = (token.expires_at - token.created_at).whole_seconds().max(0) as u64;
        Self {
            token: token.value,
            state: token.state,
            expires_at: token.expires_at,
            expires_in,
        }
    }
}

/// Response for a status poll.
#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    /// Effective state, with expiry applied.
    pub state: TokenState,
}

// =============================================================================
// Handlers
// =============================================================================

/// Issues a new QR token.
pub async fn issue_token_handler(
    State(state): State<TokenEndpointState>,
) -> Result<(StatusCode, Json<IssuedTokenResponse>), QrAuthError> {
    let token = state.token_service.issue().await?;
    Ok((StatusCode::CREATED, Json(token.into())))
}

/// Returns the effective state of a token.
///
/// Unknown (or already evicted) tokens answer `404` with the
/// `invalid_credential` code.
pub async fn token_status_handler(
    State(state): State<TokenEndpointState>,
    Path(token): Path<String>,
) -> Result<Response, QrAuthError> {
    match state.token_service.status(&token).await? {
        Some(token_state) => Ok(Json(TokenStatusResponse { state: token_state }).into_response()),
        None => {
            let kind = FailureKind::InvalidCredential;
            Ok((
                StatusCode::NOT_FOUND,
                Json(error_body(kind.code(), kind.description())),
            )
                .into_response())
        }
    }
}

/// Creates the token routes.
pub fn token_routes(state: TokenEndpointState) -> Router {
    Router::new()
        .route("/qrcode/tokens", post(issue_token_handler))
        .route("/qrcode/tokens/{token}", get(token_status_handler))
        .with_state(state)
}
