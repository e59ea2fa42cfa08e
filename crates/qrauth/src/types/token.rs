//! QR token and its lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──confirm──▶ Confirmed ──consume──▶ Consumed
//!    │                     │
//!    └──────expire─────────┴──────▶ Expired
//! ```
//!
//! Transitions only move forward. Expiry is time based: once `expires_at`
//! has passed, a `Pending` or `Confirmed` token behaves as `Expired` even if
//! the stored state has not been rewritten yet.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::QrAuthError;

/// Returns `now + lifetime` without overflowing.
pub(crate) fn expiry_after(now: OffsetDateTime, lifetime: Duration) -> AuthResult<OffsetDateTime> {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| {
            QrAuthError::configuration(format!("lifetime out of range: {:?}", lifetime))
        })
}

/// Authorization state of a QR token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Issued and waiting for a second device to confirm it.
    Pending,
    /// A second device bound a user identity to the token.
    Confirmed,
    /// Past its expiry time without being consumed.
    Expired,
    /// Used for a successful login. Terminal.
    Consumed,
}

impl TokenState {
    /// Returns `true` if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Consumed)
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Expired => write!(f, "expired"),
            Self::Consumed => write!(f, "consumed"),
        }
    }
}

/// One QR login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrToken {
    /// Opaque token value encoded into the QR code.
    /// 256-bit random value, base64url-encoded.
    pub value: String,

    /// Stored authorization state.
    pub state: TokenState,

    /// Identity bound by the confirming device.
    /// None until the token is confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Timestamp when the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Timestamp after which the token can no longer be used.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Timestamp of the confirmation.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub confirmed_at: Option<OffsetDateTime>,

    /// Timestamp of the consuming login.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub consumed_at: Option<OffsetDateTime>,
}

impl QrToken {
    /// Creates a `Pending` token with the given value and validity window.
    #[must_use]
    pub fn new(
        value: impl Into<String>,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            value: value.into(),
            state: TokenState::Pending,
            identity: None,
            created_at,
            expires_at,
            confirmed_at: None,
            consumed_at: None,
        }
    }

    /// Issues a fresh `Pending` token valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `ttl` runs past the representable
    /// date range.
    pub fn issue(ttl: Duration) -> AuthResult<Self> {
        let now = OffsetDateTime::now_utc();
        Ok(Self::new(Self::generate_value(), now, expiry_after(now, ttl)?))
    }

    /// Generates a new cryptographically secure token value.
    ///
    /// 32 bytes from the thread-local CSPRNG, encoded as base64url without
    /// padding (43 characters).
    #[must_use]
    pub fn generate_value() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Short, non-reversible fingerprint of a token value for log lines.
    #[must_use]
    pub fn fingerprint(value: &str) -> String {
        let digest = Sha256::digest(value.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Returns `true` if the validity window has closed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// State as observed at `now`, with expiry applied.
    #[must_use]
    pub fn effective_state_at(&self, now: OffsetDateTime) -> TokenState {
        match self.state {
            TokenState::Pending | TokenState::Confirmed if self.is_expired_at(now) => {
                TokenState::Expired
            }
            state => state,
        }
    }

    /// State as observed right now.
    #[must_use]
    pub fn effective_state(&self) -> TokenState {
        self.effective_state_at(OffsetDateTime::now_utc())
    }

    /// Binds `identity` to a `Pending` token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the token is `Pending` and unexpired
    /// at `now`.
    pub fn confirm(&mut self, identity: impl Into<String>, now: OffsetDateTime) -> AuthResult<()> {
        match self.effective_state_at(now) {
            TokenState::Pending => {
                self.state = TokenState::Confirmed;
                self.identity = Some(identity.into());
                self.confirmed_at = Some(now);
                Ok(())
            }
            other => Err(QrAuthError::invalid_transition(format!(
                "cannot confirm a token that is {}",
                other
            ))),
        }
    }

    /// Marks a `Confirmed` token as consumed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the token is `Confirmed` and
    /// unexpired at `now`.
    pub fn consume(&mut self, now: OffsetDateTime) -> AuthResult<()> {
        match self.effective_state_at(now) {
            TokenState::Confirmed => {
                self.state = TokenState::Consumed;
                self.consumed_at = Some(now);
                Ok(())
            }
            other => Err(QrAuthError::invalid_transition(format!(
                "cannot consume a token that is {}",
                other
            ))),
        }
    }

    /// Rewrites a `Pending`/`Confirmed` token to `Expired`.
    ///
    /// Returns `true` if the stored state changed.
    pub fn expire(&mut self) -> bool {
        match self.state {
            TokenState::Pending | TokenState::Confirmed => {
                self.state = TokenState::Expired;
                true
            }
            TokenState::Expired | TokenState::Consumed => false,
        }
    }

    /// Returns `true` if the token may be evicted at `now`.
    ///
    /// Expired tokens are kept until `expires_at + grace`; consumed tokens
    /// until `consumed_at + grace`. Live tokens are never evictable.
    #[must_use]
    pub fn is_evictable_at(&self, now: OffsetDateTime, grace: Duration) -> bool {
        match self.effective_state_at(now) {
            TokenState::Pending | TokenState::Confirmed => false,
            TokenState::Expired => now >= self.expires_at + grace,
            TokenState::Consumed => {
                let consumed_at = self.consumed_at.unwrap_or(self.expires_at);
                now >= consumed_at + grace
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(secs: i64) -> QrToken {
        let now = OffsetDateTime::now_utc();
        QrToken::new("T1", now, now + time::Duration::seconds(secs))
    }

    #[test]
    fn test_generate_value_length_and_uniqueness() {
        let a = QrToken::generate_value();
        let b = QrToken::generate_value();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(!a.contains('='));
    }

    #[test]
    fn test_issue_is_pending() {
        let token = QrToken::issue(Duration::from_secs(60)).unwrap();
        assert_eq!(token.state, TokenState::Pending);
        assert!(token.identity.is_none());
        assert!(token.expires_at > token.created_at);
    }

    #[test]
    fn test_issue_rejects_overflowing_ttl() {
        let err = QrToken::issue(Duration::from_secs(10_000 * 365 * 24 * 3600)).unwrap_err();
        assert!(matches!(err, QrAuthError::Configuration { .. }));
        assert!(QrToken::issue(Duration::MAX).is_err());
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let fp = QrToken::fingerprint("secret-token");
        assert_eq!(fp.len(), 12);
        assert_eq!(fp, QrToken::fingerprint("secret-token"));
        assert!(!fp.contains("secret"));
    }

    #[test]
    fn test_forward_lifecycle() {
        let now = OffsetDateTime::now_utc();
        let mut token = token_expiring_in(60);

        token.confirm("U1", now).unwrap();
        assert_eq!(token.state, TokenState::Confirmed);
        assert_eq!(token.identity.as_deref(), Some("U1"));

        token.consume(now).unwrap();
        assert_eq!(token.state, TokenState::Consumed);
        assert!(token.consumed_at.is_some());
    }

    #[test]
    fn test_no_backward_transitions() {
        let now = OffsetDateTime::now_utc();
        let mut token = token_expiring_in(60);

        // Pending cannot be consumed directly
        assert!(token.consume(now).is_err());

        token.confirm("U1", now).unwrap();
        // Confirmed cannot be confirmed again
        assert!(token.confirm("U2", now).is_err());
        assert_eq!(token.identity.as_deref(), Some("U1"));

        token.consume(now).unwrap();
        assert!(token.consume(now).is_err());
        assert!(token.confirm("U1", now).is_err());
        assert!(!token.expire());
        assert_eq!(token.state, TokenState::Consumed);
    }

    #[test]
    fn test_expiry_overrides_pending_and_confirmed() {
        let mut token = token_expiring_in(-1);
        assert_eq!(token.effective_state(), TokenState::Expired);

        token.state = TokenState::Confirmed;
        assert_eq!(token.effective_state(), TokenState::Expired);
        assert!(token.consume(OffsetDateTime::now_utc()).is_err());
    }

    #[test]
    fn test_expire_rewrites_live_states_only() {
        let mut token = token_expiring_in(60);
        assert!(token.expire());
        assert_eq!(token.state, TokenState::Expired);
        assert!(!token.expire());
    }

    #[test]
    fn test_eviction_respects_grace_period() {
        let grace = Duration::from_secs(30);
        let now = OffsetDateTime::now_utc();

        let live = token_expiring_in(60);
        assert!(!live.is_evictable_at(now, grace));

        let recently_expired = token_expiring_in(-10);
        assert!(!recently_expired.is_evictable_at(now, grace));

        let long_expired = token_expiring_in(-60);
        assert!(long_expired.is_evictable_at(now, grace));

        let mut consumed = token_expiring_in(60);
        consumed.confirm("U1", now).unwrap();
        consumed.consume(now - time::Duration::seconds(45)).unwrap();
        assert!(consumed.is_evictable_at(now, grace));
    }

    #[test]
    fn test_state_display_and_terminal() {
        assert_eq!(TokenState::Pending.to_string(), "pending");
        assert_eq!(TokenState::Consumed.to_string(), "consumed");
        assert!(TokenState::Consumed.is_terminal());
        assert!(TokenState::Expired.is_terminal());
        assert!(!TokenState::Confirmed.is_terminal());
    }
}
