//! Request interception for the QR login path.
//!
//! - [`PathPattern`] - ant-style activation pattern
//! - [`TokenExtractor`] - cookie/header/parameter token lookup
//! - [`SessionAuthenticationStrategy`] - binds the principal to a session
//! - [`RememberMeServices`] - optional long-lived login cookie
//! - [`QrAuthorizationFilter`] - ties it all together, plus the axum
//!   middleware [`qr_authorization_middleware`]

pub mod extract;
pub mod pattern;
pub mod processing;
pub mod remember_me;
pub mod session;

pub use extract::TokenExtractor;
pub use pattern::PathPattern;
pub use processing::{
    QrAuthorizationFilter, QrAuthorizationFilterBuilder, qr_authorization_middleware,
};
pub use remember_me::{RememberMeServices, TokenRememberMeServices};
pub use session::{InMemorySessionRegistry, NullSessionStrategy, SessionAuthenticationStrategy};
