//! Authentication event listeners.
//!
//! Listeners observe every resolved QR login attempt:
//!
//! - successful logins, with the authenticated principal
//! - failed attempts, with the failure kind and the token source
//!
//! [`TracingAuthenticationListener`] writes both to the `qrauth::audit`
//! tracing target so they can be routed to a separate sink.

use crate::types::{AuthenticationFailure, AuthorizationRequestContext, Principal};

/// Tracing target used for audit events.
pub const AUDIT_TARGET: &str = "qrauth::audit";

/// Observer notified by the filter before the handler runs.
///
/// Listeners must not block; hand work off to a task if needed.
pub trait AuthenticationListener: Send + Sync {
    /// A request authenticated successfully.
    fn on_success(&self, context: &AuthorizationRequestContext, principal: &Principal);

    /// A request failed to authenticate.
    fn on_failure(&self, context: &AuthorizationRequestContext, failure: &AuthenticationFailure);
}

/// Emits audit events as tracing records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuthenticationListener;

impl AuthenticationListener for TracingAuthenticationListener {
    fn on_success(&self, context: &AuthorizationRequestContext, principal: &Principal) {
        tracing::info!(
            target: AUDIT_TARGET,
            outcome = "success",
            user = %principal.username,
            user_id = %principal.id,
            source = ?context.source,
            path = %context.path,
            "QR login"
        );
    }

    fn on_failure(&self, context: &AuthorizationRequestContext, failure: &AuthenticationFailure) {
        tracing::info!(
            target: AUDIT_TARGET,
            outcome = "failure",
            reason = %failure.kind,
            source = ?context.source,
            path = %context.path,
            "QR login"
        );
    }
}
