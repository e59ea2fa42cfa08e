//! Ant-style path patterns.
//!
//! Supported wildcards:
//!
//! - `?` matches one character within a segment
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more whole segments
//!
//! `/login/**` therefore matches `/login`, `/login/qrcode` and
//! `/login/a/b`, while `/login/*/qr` matches `/login/mobile/qr` only.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::QrAuthError;

/// A compiled ant-style path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is empty, does not start
    /// with `/`, or cannot be compiled.
    pub fn compile(pattern: &str) -> Result<Self, QrAuthError> {
        if !pattern.starts_with('/') {
            return Err(QrAuthError::configuration(format!(
                "path pattern must start with '/': {:?}",
                pattern
            )));
        }

        let mut regex_pattern = String::from("^");
        for segment in pattern[1..].split('/') {
            if segment == "**" {
                regex_pattern.push_str("(?:/[^/]*)*");
                continue;
            }
            regex_pattern.push('/');
            for ch in segment.chars() {
                match ch {
                    '*' => regex_pattern.push_str("[^/]*"),
                    '?' => regex_pattern.push_str("[^/]"),
                    other => regex_pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
                }
            }
        }
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| {
            QrAuthError::configuration(format!("invalid path pattern {:?}: {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Returns `true` if `path` matches the pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The source pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl FromStr for PathPattern {
    type Err = QrAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
