//! HTTP handlers for the issuing side of the QR flow.
//!
//! # Available Handlers
//!
//! - [`tokens`] - token issuing and status polling

pub mod tokens;

pub use tokens::{
    IssuedTokenResponse, TokenEndpointState, TokenStatusResponse, issue_token_handler,
    token_routes, token_status_handler,
};
