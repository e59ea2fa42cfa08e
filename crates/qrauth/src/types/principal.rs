//! Authenticated principal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identity resolved from a confirmed QR token.
///
/// Produced by a [`UserResolver`](crate::storage::UserResolver), owned by the
/// provider during validation and then handed to the session strategy and
/// success handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identity, as bound to the token by the confirming device.
    pub id: String,

    /// Username for display/logging.
    pub username: String,

    /// Granted authorities (roles or permissions).
    #[serde(default)]
    pub authorities: Vec<String>,

    /// Additional attributes for downstream authorization decisions.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Principal {
    /// Creates a principal without authorities.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            authorities: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Adds an authority.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Returns `true` if the principal holds `authority`.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// Returns `true` if the principal holds any of `authorities`.
    #[must_use]
    pub fn has_any_authority(&self, authorities: &[&str]) -> bool {
        authorities.iter().any(|a| self.has_authority(a))
    }

    /// Gets an attribute value by key.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}
