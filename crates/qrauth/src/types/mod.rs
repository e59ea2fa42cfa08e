//! Domain types shared across the crate.
//!
//! - [`QrToken`] / [`TokenState`] - one login attempt and its lifecycle
//! - [`Principal`] - resolved identity with authorities
//! - [`AuthorizationRequestContext`] - token extracted from one request
//! - [`AuthenticationOutcome`] - result of validating one request

pub mod context;
pub mod outcome;
pub mod principal;
pub mod token;

pub use context::AuthorizationRequestContext;
pub use outcome::{AuthenticationFailure, AuthenticationOutcome};
pub use principal::Principal;
pub use token::{QrToken, TokenState};
