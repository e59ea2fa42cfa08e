//! QR token lifecycle.
//!
//! [`TokenService`] is the issuing side of the QR flow: it creates tokens for
//! the QR code, lets the second device confirm them, answers status polls and
//! evicts stale tokens in the background.

pub mod service;

pub use service::TokenService;
