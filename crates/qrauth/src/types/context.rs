//! Per-request authorization context.

use crate::config::TokenSource;

/// Transient data extracted from one request matching the QR login path.
///
/// Built by the filter during extraction and dropped once the request has
/// been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequestContext {
    /// Raw token value, if any source carried a non-empty one.
    pub token: Option<String>,

    /// Source the token was read from.
    pub source: Option<TokenSource>,

    /// Request path that matched the activation pattern.
    pub path: String,
}

impl AuthorizationRequestContext {
    /// Creates a context carrying a token read from `source`.
    #[must_use]
    pub fn new(path: impl Into<String>, token: impl Into<String>, source: TokenSource) -> Self {
        Self {
            token: Some(token.into()),
            source: Some(source),
            path: path.into(),
        }
    }

    /// Creates a context for a request that presented no token.
    #[must_use]
    pub fn without_token(path: impl Into<String>) -> Self {
        Self {
            token: None,
            source: None,
            path: path.into(),
        }
    }

    /// Returns `true` if a token was extracted.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}
