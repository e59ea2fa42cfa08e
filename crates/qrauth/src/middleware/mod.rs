//! HTTP middleware support for QR authentication.
//!
//! This module provides:
//!
//! - [`SessionAuth`] - extractor for resources behind a QR login
//! - JSON error rendering (`IntoResponse` for [`QrAuthError`](crate::QrAuthError))
//!
//! The filter middleware itself lives in [`crate::filter`].

pub mod auth;
pub mod error;

pub use auth::{SessionAuth, SessionState};
pub use error::{error_body, error_response, failure_response};
