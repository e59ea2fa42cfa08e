//! Storage traits for QR login data.
//!
//! This module defines the two external collaborators of the provider:
//!
//! - [`CredentialStore`] - authoritative token state, with an atomic
//!   consume primitive
//! - [`UserResolver`] - maps a confirmed identity to a [`Principal`](crate::types::Principal)
//!
//! In-memory implementations backed by `DashMap` live in [`memory`].

pub mod credential;
pub mod memory;
pub mod user;

pub use credential::CredentialStore;
pub use memory::{InMemoryCredentialStore, InMemoryUserResolver};
pub use user::UserResolver;
