//! Session authentication strategies.
//!
//! After a successful QR login the strategy binds the principal to a
//! session. [`InMemorySessionRegistry`] always issues a fresh session id
//! (dropping any session the browser presented) so a session id planted
//! before login cannot be reused after it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cookie::{Cookie, SameSite};
use dashmap::DashMap;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::SessionConfig;
use crate::error::QrAuthError;
use crate::types::Principal;
use crate::types::token::expiry_after;

/// Binds an authenticated principal to the caller's session.
#[async_trait]
pub trait SessionAuthenticationStrategy: Send + Sync {
    /// Called once per successful authentication, before the success
    /// handler runs. Headers written to `response_headers` are merged into
    /// the final response.
    ///
    /// # Errors
    ///
    /// Errors propagate to the entry point; the success handler is not
    /// invoked.
    async fn on_authentication(
        &self,
        request: &Parts,
        response_headers: &mut HeaderMap,
        principal: &Principal,
    ) -> AuthResult<()>;
}

/// Strategy that leaves session handling to someone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSessionStrategy;

#[async_trait]
impl SessionAuthenticationStrategy for NullSessionStrategy {
    async fn on_authentication(
        &self,
        _request: &Parts,
        _response_headers: &mut HeaderMap,
        _principal: &Principal,
    ) -> AuthResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    principal: Principal,
    expires_at: OffsetDateTime,
}

/// Cookie-backed session store kept in process memory.
#[derive(Debug)]
pub struct InMemorySessionRegistry {
    config: SessionConfig,
    sessions: DashMap<String, SessionRecord>,
}

impl InMemorySessionRegistry {
    /// Creates a registry using the `session` configuration section.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Creates a shared registry.
    #[must_use]
    pub fn shared(config: SessionConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Returns the principal bound to the session cookie of `request`.
    #[must_use]
    pub fn principal(&self, request: &Parts) -> Option<Principal> {
        let id = read_cookie(&request.headers, &self.config.cookie_name)?;
        self.get(&id)
    }

    /// Returns the principal bound to session `id`, if it is still valid.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Principal> {
        let record = self.sessions.get(id)?;
        if OffsetDateTime::now_utc() >= record.expires_at {
            drop(record);
            self.sessions.remove(id);
            return None;
        }
        Some(record.principal.clone())
    }

    /// Invalidates session `id`. Returns `true` if it existed.
    pub fn invalidate(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Evicts sessions past their lifetime. Returns the number removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = OffsetDateTime::now_utc();
        let mut removed = 0u64;
        self.sessions.retain(|_, record| {
            let keep = now < record.expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of sessions held, including ones past their lifetime.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionAuthenticationStrategy for InMemorySessionRegistry {
    async fn on_authentication(
        &self,
        request: &Parts,
        response_headers: &mut HeaderMap,
        principal: &Principal,
    ) -> AuthResult<()> {
        let previous = read_cookie(&request.headers, &self.config.cookie_name)
            .filter(|id| self.sessions.contains_key(id));

        if previous.is_none() && !self.config.allow_session_creation {
            tracing::debug!(
                user = %principal.username,
                "Session creation disabled; principal not bound to a session"
            );
            return Ok(());
        }

        if let Some(old) = &previous {
            self.sessions.remove(old);
        }

        let id = generate_session_id();
        self.sessions.insert(
            id.clone(),
            SessionRecord {
                principal: principal.clone(),
                expires_at: expiry_after(OffsetDateTime::now_utc(), self.config.max_age)?,
            },
        );

        append_cookie(
            response_headers,
            &self.config,
            &self.config.cookie_name,
            &id,
            self.config.max_age,
        )?;

        tracing::debug!(
            user = %principal.username,
            rotated = previous.is_some(),
            "Session bound to principal"
        );
        Ok(())
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Reads a cookie value from request headers.
pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

/// Appends a `Set-Cookie` header using the session cookie attributes.
pub(crate) fn append_cookie(
    headers: &mut HeaderMap,
    attributes: &SessionConfig,
    name: &str,
    value: &str,
    max_age: Duration,
) -> AuthResult<()> {
    let same_site = match attributes.same_site.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    };
    let max_age = time::Duration::try_from(max_age)
        .map_err(|e| QrAuthError::configuration(format!("cookie max-age out of range: {}", e)))?;

    let cookie = Cookie::build((name.to_string(), value.to_string()))
        .path(attributes.path.clone())
        .http_only(attributes.http_only)
        .secure(attributes.secure)
        .same_site(same_site)
        .max_age(max_age)
        .build();

    let header = HeaderValue::from_str(&cookie.encoded().to_string())
        .map_err(|e| QrAuthError::handler(format!("invalid Set-Cookie value: {}", e)))?;
    headers.append(SET_COOKIE, header);
    Ok(())
}
