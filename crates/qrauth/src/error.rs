//! Error types for QR-code authentication.
//!
//! Two families of errors live here:
//!
//! - [`FailureKind`] is the credential failure taxonomy. A failure of this kind
//!   is an expected outcome of validating a token and is routed to a failure
//!   handler; it never aborts the request.
//! - [`QrAuthError`] covers infrastructure and programming errors (storage,
//!   timeouts, configuration, invalid state transitions, handler failures).

use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Why a presented QR token did not authenticate the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No token was found in any configured source.
    MissingCredential,
    /// The token was never issued (or has already been evicted).
    InvalidCredential,
    /// The token exists but no second device has confirmed it yet.
    NotYetConfirmed,
    /// The token is past its expiry time.
    CredentialExpired,
    /// The token was already used to log in once.
    CredentialReused,
    /// The confirmed identity no longer resolves to a principal.
    PrincipalNotFound,
    /// The credential store or user directory could not be reached.
    ///
    /// This is the only transient kind: clients should retry the same token
    /// instead of restarting the QR flow.
    ServiceUnavailable,
}

impl FailureKind {
    /// Returns the stable, machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::NotYetConfirmed => "not_yet_confirmed",
            Self::CredentialExpired => "credential_expired",
            Self::CredentialReused => "credential_reused",
            Self::PrincipalNotFound => "principal_not_found",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }

    /// Returns `true` if the client may retry with the same token.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable | Self::NotYetConfirmed)
    }

    /// HTTP status a failure handler should answer with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Human-readable default description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::MissingCredential => "No QR authorization token was presented",
            Self::InvalidCredential => "QR authorization token is not recognized",
            Self::NotYetConfirmed => "QR authorization token has not been confirmed yet",
            Self::CredentialExpired => "QR authorization token has expired",
            Self::CredentialReused => "QR authorization token has already been used",
            Self::PrincipalNotFound => "Confirmed account could not be resolved",
            Self::ServiceUnavailable => "Authentication service is temporarily unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised by the infrastructure around token validation.
#[derive(Debug, thiserror::Error)]
pub enum QrAuthError {
    /// The credential store or user directory failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// A collaborator did not answer within the configured timeout.
    #[error("Timed out waiting for {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// A token state change was requested that the lifecycle forbids.
    #[error("Invalid token transition: {message}")]
    InvalidTransition {
        /// Description of the rejected transition.
        message: String,
    },

    /// A protected resource was requested without an authenticated session.
    #[error("Authentication required: {message}")]
    Unauthenticated {
        /// Description of what was missing.
        message: String,
    },

    /// A success/failure handler or session strategy failed.
    #[error("Handler error: {message}")]
    Handler {
        /// Description of the handler error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl QrAuthError {
    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTransition` error.
    #[must_use]
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthenticated` error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a new `Handler` error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if the caller asked for something the lifecycle forbids.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::Unauthenticated { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage { .. } | Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::InvalidTransition { .. } | Self::Unauthenticated { .. } => ErrorCategory::Token,
            Self::Handler { .. } | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the machine-readable error code used in response bodies.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Storage { .. } | Self::Timeout { .. } => "service_unavailable",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::Configuration { .. } | Self::Handler { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Maps the error onto the failure a provider reports for it.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        FailureKind::ServiceUnavailable
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Storage or collaborator failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Token lifecycle violations.
    Token,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Token => write!(f, "token"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
