//! Request predicates used to dispatch among handlers.

use axum::http::header::ACCEPT;
use axum::http::request::Parts;
use axum::http::{HeaderName, Method};

use crate::AuthResult;
use crate::filter::PathPattern;

/// A predicate over request parts.
///
/// Matchers are pure: evaluating one has no side effects and depends only
/// on the request.
#[derive(Debug, Clone)]
pub enum RequestMatcher {
    /// Matches every request.
    Any,
    /// Path starts with the given prefix.
    PathPrefix(String),
    /// Path matches an ant-style pattern.
    PathPattern(PathPattern),
    /// Header is present (any value).
    HeaderPresent(HeaderName),
    /// Header value contains the given substring (case-insensitive).
    HeaderContains {
        /// Header to inspect.
        name: HeaderName,
        /// Expected substring.
        value: String,
    },
    /// `Accept` header asks for a JSON representation.
    AcceptsJson,
    /// Request method equals the given one.
    Method(Method),
    /// Every inner matcher matches.
    All(Vec<RequestMatcher>),
    /// At least one inner matcher matches.
    AnyOf(Vec<RequestMatcher>),
    /// Inner matcher does not match.
    Not(Box<RequestMatcher>),
}

impl RequestMatcher {
    /// Shorthand for [`RequestMatcher::PathPattern`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is invalid.
    pub fn path_pattern(pattern: &str) -> AuthResult<Self> {
        Ok(Self::PathPattern(PathPattern::compile(pattern)?))
    }

    /// Shorthand for [`RequestMatcher::HeaderContains`].
    #[must_use]
    pub fn header_contains(name: HeaderName, value: impl Into<String>) -> Self {
        Self::HeaderContains {
            name,
            value: value.into(),
        }
    }

    /// Negates `matcher`.
    #[must_use]
    pub fn not(matcher: RequestMatcher) -> Self {
        Self::Not(Box::new(matcher))
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn matches(&self, parts: &Parts) -> bool {
        match self {
            Self::Any => true,
            Self::PathPrefix(prefix) => parts.uri.path().starts_with(prefix.as_str()),
            Self::PathPattern(pattern) => pattern.matches(parts.uri.path()),
            Self::HeaderPresent(name) => parts.headers.contains_key(name),
            Self::HeaderContains { name, value } => {
                let needle = value.to_ascii_lowercase();
                parts
                    .headers
                    .get_all(name)
                    .iter()
                    .filter_map(|h| h.to_str().ok())
                    .any(|h| h.to_ascii_lowercase().contains(&needle))
            }
            Self::AcceptsJson => parts
                .headers
                .get_all(ACCEPT)
                .iter()
                .filter_map(|h| h.to_str().ok())
                .any(|h| h.contains("application/json") || h.contains("+json")),
            Self::Method(method) => parts.method == *method,
            Self::All(matchers) => matchers.iter().all(|m| m.matches(parts)),
            Self::AnyOf(matchers) => matchers.iter().any(|m| m.matches(parts)),
            Self::Not(matcher) => !matcher.matches(parts),
        }
    }
}
