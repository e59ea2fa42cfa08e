//! Token extraction from cookies, headers and query parameters.

use axum::http::header::COOKIE;
use axum::http::request::Parts;
use cookie::Cookie;

use crate::config::{ExtractionConfig, TokenSource};
use crate::types::AuthorizationRequestContext;

/// Reads the QR token from the configured sources in priority order.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    cookie_name: String,
    header_name: String,
    param_name: String,
    priority: Vec<TokenSource>,
}

impl TokenExtractor {
    /// Creates an extractor from the `extraction` configuration section.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.clone(),
            param_name: config.param_name.clone(),
            priority: config.priority.clone(),
        }
    }

    /// Builds the request context. The first source yielding a non-empty
    /// value wins.
    #[must_use]
    pub fn extract(&self, parts: &Parts) -> AuthorizationRequestContext {
        let path = parts.uri.path();

        for source in &self.priority {
            let value = match source {
                TokenSource::Cookie => self.from_cookie(parts),
                TokenSource::Header => self.from_header(parts),
                TokenSource::Parameter => self.from_query(parts),
            };
            if let Some(token) = value {
                tracing::trace!(source = %source, "QR token extracted");
                return AuthorizationRequestContext::new(path, token, *source);
            }
        }

        AuthorizationRequestContext::without_token(path)
    }

    fn from_cookie(&self, parts: &Parts) -> Option<String> {
        parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(Cookie::split_parse_encoded)
            .filter_map(Result::ok)
            .filter(|c| c.name() == self.cookie_name)
            .find_map(|c| non_empty(c.value()))
    }

    fn from_header(&self, parts: &Parts) -> Option<String> {
        parts
            .headers
            .get(self.header_name.as_str())
            .and_then(|h| h.to_str().ok())
            .and_then(non_empty)
    }

    fn from_query(&self, parts: &Parts) -> Option<String> {
        let query = parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key.as_ref() == self.param_name)
            .find_map(|(_, value)| non_empty(&value))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
