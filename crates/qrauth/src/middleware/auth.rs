//! Session authentication extractor.
//!
//! Resources behind a QR login read the principal through [`SessionAuth`].
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use qrauth::middleware::{SessionAuth, SessionState};
//!
//! async fn me(SessionAuth(principal): SessionAuth) -> String {
//!     format!("Hello, {}!", principal.username)
//! }
//!
//! let app = Router::new()
//!     .route("/api/me", get(me))
//!     .with_state(session_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::error::QrAuthError;
use crate::filter::{InMemorySessionRegistry, RememberMeServices};
use crate::types::Principal;

// =============================================================================
// Session State
// =============================================================================

/// State required by the [`SessionAuth`] extractor.
///
/// Include it in your application state and expose it via `FromRef`.
#[derive(Clone)]
pub struct SessionState {
    /// Sessions established by successful QR logins.
    pub sessions: Arc<InMemorySessionRegistry>,

    /// Remember-me services consulted when no session is present.
    pub remember_me: Option<Arc<dyn RememberMeServices>>,
}

impl SessionState {
    /// Creates a session state without remember-me.
    pub fn new(sessions: Arc<InMemorySessionRegistry>) -> Self {
        Self {
            sessions,
            remember_me: None,
        }
    }

    /// Enables remember-me fallback.
    #[must_use]
    pub fn with_remember_me(mut self, remember_me: Arc<dyn RememberMeServices>) -> Self {
        self.remember_me = Some(remember_me);
        self
    }
}

// =============================================================================
// Session Auth Extractor
// =============================================================================

/// Axum extractor yielding the principal of the caller's session.
///
/// Lookup order:
/// 1. Session cookie
/// 2. Remember-me cookie, if remember-me is configured
///
/// # Errors
///
/// Rejects with `QrAuthError::Unauthenticated` (401) if neither yields a
/// principal.
pub struct SessionAuth(pub Principal);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: Send + Sync,
    SessionState: FromRef<S>,
{
    type Rejection = QrAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session_state = SessionState::from_ref(state);

        if let Some(principal) = session_state.sessions.principal(parts) {
            return Ok(SessionAuth(principal));
        }

        if let Some(remember_me) = &session_state.remember_me
            && let Some(principal) = remember_me.auto_login(parts).await?
        {
            tracing::debug!(user = %principal.username, "Principal restored from remember-me cookie");
            return Ok(SessionAuth(principal));
        }

        Err(QrAuthError::unauthenticated("No authenticated session"))
    }
}
