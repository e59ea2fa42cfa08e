//! Result of validating one request.

use serde::Serialize;

use crate::error::FailureKind;

use super::Principal;

/// Typed authentication failure with a detail message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationFailure {
    /// Failure taxonomy entry.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub detail: String,
}

impl AuthenticationFailure {
    /// Creates a failure with an explicit detail.
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Machine-readable code of the failure kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl From<FailureKind> for AuthenticationFailure {
    fn from(kind: FailureKind) -> Self {
        Self::new(kind, kind.description())
    }
}

/// Outcome of one authentication attempt.
///
/// Produced once per request by a provider and consumed exactly once by the
/// filter to pick a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationOutcome {
    /// The token authenticated this principal.
    Success(Principal),
    /// The token did not authenticate the request.
    Failure(AuthenticationFailure),
}

impl AuthenticationOutcome {
    /// Shorthand for a failure with the kind's default description.
    #[must_use]
    pub fn failure(kind: FailureKind) -> Self {
        Self::Failure(kind.into())
    }

    /// Shorthand for a failure with a custom detail.
    #[must_use]
    pub fn failure_with(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure(AuthenticationFailure::new(kind, detail))
    }

    /// Returns `true` for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The failure kind, if any.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }

    /// The principal, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Success(principal) => Some(principal),
            Self::Failure(_) => None,
        }
    }
}
