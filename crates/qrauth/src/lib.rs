//! # qrauth
//!
//! QR-code login authorization for axum services.
//!
//! A browser displays a QR code carrying a short-lived token. A second,
//! already authenticated device scans it and confirms the token for its
//! user. The browser then presents the token on the login path and this
//! crate turns it into an authenticated session, exactly once.
//!
//! ## Overview
//!
//! ```text
//! request ─▶ QrAuthorizationFilter ─▶ AuthenticationManager ─▶ QrAuthorizationProvider
//!                 │                                               │
//!                 │                                   CredentialStore + UserResolver
//!                 ▼
//!   session strategy / remember-me ─▶ success handler  |  failure handler
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Filter, token, session and store configuration
//! - [`types`] - Tokens, principals and authentication outcomes
//! - [`storage`] - Credential store and user resolver traits, in-memory backends
//! - [`token`] - Token issuing, confirmation and sweeping
//! - [`provider`] - Authentication providers and the provider manager
//! - [`filter`] - Request interception, token extraction, sessions, remember-me
//! - [`handlers`] - Success/failure handlers, entry points and dispatch
//! - [`middleware`] - Session extractor and error rendering
//! - [`audit`] - Authentication listeners
//! - [`http`] - Axum handlers for issuing and polling tokens

pub mod audit;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod http;
pub mod middleware;
pub mod provider;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{ConfigError, QrAuthConfig, TokenSource};
pub use error::{ErrorCategory, FailureKind, QrAuthError};
pub use filter::{QrAuthorizationFilter, qr_authorization_middleware};
pub use provider::{AuthenticationManager, AuthenticationProvider, QrAuthorizationProvider};
pub use storage::{CredentialStore, InMemoryCredentialStore, InMemoryUserResolver, UserResolver};
pub use token::TokenService;
pub use types::{
    AuthenticationFailure, AuthenticationOutcome, AuthorizationRequestContext, Principal, QrToken,
    TokenState,
};

/// Type alias for QR authentication results.
pub type AuthResult<T> = Result<T, QrAuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use qrauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::audit::{AuthenticationListener, TracingAuthenticationListener};
    pub use crate::config::{ConfigError, QrAuthConfig, TokenSource};
    pub use crate::error::{ErrorCategory, FailureKind, QrAuthError};
    pub use crate::filter::{
        InMemorySessionRegistry, NullSessionStrategy, PathPattern, QrAuthorizationFilter,
        RememberMeServices, SessionAuthenticationStrategy, TokenRememberMeServices,
        qr_authorization_middleware,
    };
    pub use crate::handlers::{
        AuthenticationEntryPoint, AuthenticationFailureHandler, AuthenticationSuccessHandler,
        HandlerRegistry, JsonEntryPoint, JsonFailureHandler, JsonSuccessHandler,
        RedirectEntryPoint, RedirectFailureHandler, RedirectSuccessHandler, RequestMatcher,
    };
    pub use crate::http::{TokenEndpointState, token_routes};
    pub use crate::middleware::{SessionAuth, SessionState};
    pub use crate::provider::{
        AuthenticationManager, AuthenticationProvider, QrAuthorizationProvider,
    };
    pub use crate::storage::{
        CredentialStore, InMemoryCredentialStore, InMemoryUserResolver, UserResolver,
    };
    pub use crate::token::TokenService;
    pub use crate::types::{
        AuthenticationFailure, AuthenticationOutcome, AuthorizationRequestContext, Principal,
        QrToken, TokenState,
    };
}
