//! Remember-me persistence.
//!
//! On a successful login the browser receives a long-lived random cookie.
//! Only the SHA-256 hash of the cookie value is stored, so a leaked store
//! does not leak usable cookies.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::{RememberMeConfig, SessionConfig};
use crate::types::token::expiry_after;
use crate::types::{Principal, QrToken};

use super::session::{append_cookie, read_cookie};

/// Optional persistence of a login beyond the session lifetime.
#[async_trait]
pub trait RememberMeServices: Send + Sync {
    /// Called after a successful authentication. Implementations decide
    /// whether the request asked to be remembered.
    ///
    /// # Errors
    ///
    /// Errors propagate to the entry point.
    async fn login_success(
        &self,
        request: &Parts,
        response_headers: &mut HeaderMap,
        principal: &Principal,
    ) -> AuthResult<()>;

    /// Restores the principal from a remember-me cookie, if present and
    /// still valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    async fn auto_login(&self, request: &Parts) -> AuthResult<Option<Principal>>;
}

#[derive(Debug, Clone)]
struct RememberedLogin {
    principal: Principal,
    expires_at: OffsetDateTime,
}

/// Remember-me services backed by an in-memory table of hashed tokens.
#[derive(Debug)]
pub struct TokenRememberMeServices {
    config: RememberMeConfig,
    cookie_attributes: SessionConfig,
    logins: DashMap<String, RememberedLogin>,
}

impl TokenRememberMeServices {
    /// Creates the service. Cookie attributes (path, `Secure`, `SameSite`)
    /// are shared with the session cookie.
    #[must_use]
    pub fn new(config: RememberMeConfig, cookie_attributes: SessionConfig) -> Self {
        Self {
            config,
            cookie_attributes,
            logins: DashMap::new(),
        }
    }

    /// Returns `true` if the request asked to be remembered.
    ///
    /// The flag is read from the query parameter or header named by
    /// `remember_me.parameter`; `true`, `on`, `yes` and `1` are accepted.
    #[must_use]
    pub fn remember_requested(&self, request: &Parts) -> bool {
        if self.config.always_remember {
            return true;
        }

        let from_query = request.uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key.as_ref() == self.config.parameter)
                .map(|(_, value)| value.into_owned())
        });
        let from_header = || {
            request
                .headers
                .get(self.config.parameter.as_str())
                .and_then(|h| h.to_str().ok())
                .map(ToString::to_string)
        };

        from_query
            .or_else(from_header)
            .is_some_and(|value| is_truthy(&value))
    }

    /// Evicts remembered logins past their validity. Returns the number
    /// removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = OffsetDateTime::now_utc();
        let mut removed = 0u64;
        self.logins.retain(|_, login| {
            let keep = now < login.expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of remembered logins held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logins.len()
    }

    /// Returns `true` if no logins are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }

    fn validity(&self) -> Duration {
        self.config.validity
    }
}

#[async_trait]
impl RememberMeServices for TokenRememberMeServices {
    async fn login_success(
        &self,
        request: &Parts,
        response_headers: &mut HeaderMap,
        principal: &Principal,
    ) -> AuthResult<()> {
        if !self.remember_requested(request) {
            tracing::trace!("Remember-me not requested");
            return Ok(());
        }

        let value = QrToken::generate_value();
        self.logins.insert(
            hash(&value),
            RememberedLogin {
                principal: principal.clone(),
                expires_at: expiry_after(OffsetDateTime::now_utc(), self.validity())?,
            },
        );
        append_cookie(
            response_headers,
            &self.cookie_attributes,
            &self.config.cookie_name,
            &value,
            self.validity(),
        )?;

        tracing::debug!(user = %principal.username, "Remember-me cookie issued");
        Ok(())
    }

    async fn auto_login(&self, request: &Parts) -> AuthResult<Option<Principal>> {
        let Some(value) = read_cookie(&request.headers, &self.config.cookie_name) else {
            return Ok(None);
        };
        let key = hash(&value);

        let Some(login) = self.logins.get(&key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        if OffsetDateTime::now_utc() >= login.expires_at {
            self.logins.remove(&key);
            return Ok(None);
        }
        Ok(Some(login.principal))
    }
}

fn hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "yes" | "1"
    )
}
