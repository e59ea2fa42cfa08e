//! QR-code authentication configuration.
//!
//! The loading mechanism lives in the server crate; this module only defines
//! the values the filter, provider and token service consume, together with
//! their defaults and validation.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root QR-code authentication configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [qrauth]
/// enabled = true
/// path_pattern = "/login/qrcode"
///
/// [qrauth.token]
/// ttl = "2m"
///
/// [qrauth.extraction]
/// priority = ["header", "cookie", "parameter"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QrAuthConfig {
    /// Enable/disable the QR login filter entirely.
    pub enabled: bool,

    /// Ant-style pattern of the login path the filter intercepts.
    pub path_pattern: String,

    /// HTTP methods the filter intercepts. Empty means any method.
    pub methods: Vec<String>,

    /// Token lifetime settings.
    pub token: TokenConfig,

    /// Where the filter looks for the token.
    pub extraction: ExtractionConfig,

    /// Session establishment settings.
    pub session: SessionConfig,

    /// Remember-me persistence settings.
    pub remember_me: RememberMeConfig,

    /// Credential store settings.
    pub store: StoreConfig,

    /// Redirect targets for browser-facing handlers.
    pub redirect: RedirectConfig,
}

impl Default for QrAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_pattern: "/login/qrcode".to_string(),
            methods: Vec::new(),
            token: TokenConfig::default(),
            extraction: ExtractionConfig::default(),
            session: SessionConfig::default(),
            remember_me: RememberMeConfig::default(),
            store: StoreConfig::default(),
            redirect: RedirectConfig::default(),
        }
    }
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// How long a freshly issued token stays usable.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// How long expired or consumed tokens are kept before eviction.
    /// Keeping them lets late pollers see `Expired`/`Consumed` instead of
    /// an unknown token.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            grace_period: Duration::from_secs(300),
        }
    }
}

/// Source a token can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// A request cookie.
    Cookie,
    /// A request header.
    Header,
    /// A query string parameter.
    Parameter,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookie => write!(f, "cookie"),
            Self::Header => write!(f, "header"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

/// Token extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Cookie carrying the token.
    pub cookie_name: String,

    /// Header carrying the token.
    pub header_name: String,

    /// Query parameter carrying the token.
    pub param_name: String,

    /// Order in which sources are consulted; the first non-empty value wins.
    pub priority: Vec<TokenSource>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "X-Authorization-Qrcode".to_string(),
            header_name: "X-Authorization-Qrcode".to_string(),
            param_name: "token".to_string(),
            priority: vec![
                TokenSource::Cookie,
                TokenSource::Header,
                TokenSource::Parameter,
            ],
        }
    }
}

/// Session establishment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether a new session may be created for a request without one.
    pub allow_session_creation: bool,

    /// Session cookie name.
    pub cookie_name: String,

    /// Set the `Secure` cookie attribute.
    pub secure: bool,

    /// Set the `HttpOnly` cookie attribute.
    pub http_only: bool,

    /// `SameSite` attribute: "strict", "lax" or "none".
    pub same_site: String,

    /// Cookie path.
    pub path: String,

    /// Session lifetime.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            allow_session_creation: true,
            cookie_name: "QRSESSION".to_string(),
            secure: false,
            http_only: true,
            same_site: "lax".to_string(),
            path: "/".to_string(),
            max_age: Duration::from_secs(8 * 3600),
        }
    }
}

/// Remember-me configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RememberMeConfig {
    /// Enable remember-me persistence after a successful QR login.
    pub enabled: bool,

    /// Remember-me cookie name.
    pub cookie_name: String,

    /// Request parameter (or header) asking for remember-me.
    pub parameter: String,

    /// Persist on every login, regardless of the request parameter.
    pub always_remember: bool,

    /// How long a remember-me token stays valid.
    #[serde(with = "humantime_serde")]
    pub validity: Duration,
}

impl Default for RememberMeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: "remember-me".to_string(),
            parameter: "remember-me".to_string(),
            always_remember: false,
            validity: Duration::from_secs(14 * 24 * 3600),
        }
    }
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound for a single store or user directory call.
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,

    /// How often the background sweeper evicts stale tokens.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Redirect targets for the redirect handlers.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Where to send the browser after a successful login.
    pub success_url: Option<String>,

    /// Where to send the browser after a failed login. The failure code is
    /// appended as the `error` query parameter.
    pub failure_url: Option<String>,
}

/// Longest accepted token lifetime.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

/// Longest accepted session or remember-me lifetime.
pub const MAX_COOKIE_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl QrAuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The path pattern is empty or not absolute
    /// - The token TTL or lookup timeout is zero
    /// - The token TTL exceeds [`MAX_TOKEN_TTL`], or a session or
    ///   remember-me lifetime exceeds [`MAX_COOKIE_LIFETIME`]
    /// - The extraction priority is empty or lists a source twice
    /// - A source name used by the priority list is blank
    /// - The session `same_site` value is unknown
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path_pattern.trim().is_empty() {
            return Err(ConfigError::Missing("path_pattern".to_string()));
        }
        if !self.path_pattern.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "path_pattern must start with '/': '{}'",
                self.path_pattern
            )));
        }

        if self.token.ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token.ttl must be > 0".to_string(),
            ));
        }

        if self.token.ttl > MAX_TOKEN_TTL {
            return Err(ConfigError::InvalidValue(format!(
                "token.ttl must be <= {:?}",
                MAX_TOKEN_TTL
            )));
        }

        for (name, lifetime) in [
            ("session.max_age", self.session.max_age),
            ("remember_me.validity", self.remember_me.validity),
        ] {
            if lifetime > MAX_COOKIE_LIFETIME {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be <= {:?}",
                    name, MAX_COOKIE_LIFETIME
                )));
            }
        }

        if self.store.lookup_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "store.lookup_timeout must be > 0".to_string(),
            ));
        }

        if self.extraction.priority.is_empty() {
            return Err(ConfigError::Missing("extraction.priority".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.extraction.priority {
            if !seen.insert(*source) {
                return Err(ConfigError::InvalidValue(format!(
                    "extraction.priority lists '{}' more than once",
                    source
                )));
            }
            let name = match source {
                TokenSource::Cookie => &self.extraction.cookie_name,
                TokenSource::Header => &self.extraction.header_name,
                TokenSource::Parameter => &self.extraction.param_name,
            };
            if name.trim().is_empty() {
                return Err(ConfigError::Missing(format!("extraction.{}_name", source)));
            }
        }

        match self.session.same_site.to_ascii_lowercase().as_str() {
            "strict" | "lax" | "none" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid session.same_site: '{}'. Must be strict, lax, or none",
                    other
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QrAuthConfig::default();
        assert!(config.enabled);
        assert_eq!(config.path_pattern, "/login/qrcode");
        assert_eq!(config.token.ttl, Duration::from_secs(120));
        assert_eq!(
            config.extraction.priority,
            vec![
                TokenSource::Cookie,
                TokenSource::Header,
                TokenSource::Parameter
            ]
        );
        assert!(config.session.allow_session_creation);
        assert!(!config.remember_me.enabled);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(QrAuthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_pattern_fails_validation() {
        let mut config = QrAuthConfig::default();
        config.path_pattern = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_relative_pattern_fails_validation() {
        let mut config = QrAuthConfig::default();
        config.path_pattern = "login/qrcode".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("path_pattern"));
    }

    #[test]
    fn test_zero_ttl_fails_validation() {
        let mut config = QrAuthConfig::default();
        config.token.ttl = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("token.ttl"));
    }

    #[test]
    fn test_oversized_lifetimes_fail_validation() {
        let mut config = QrAuthConfig::default();
        config.token.ttl = Duration::from_secs(5000 * 365 * 24 * 3600);
        assert!(config.validate().unwrap_err().to_string().contains("token.ttl"));

        let mut config = QrAuthConfig::default();
        config.session.max_age = MAX_COOKIE_LIFETIME + Duration::from_secs(1);
        assert!(config.validate().unwrap_err().to_string().contains("session.max_age"));

        let mut config = QrAuthConfig::default();
        config.remember_me.validity = Duration::MAX;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("remember_me.validity"));

        let mut config = QrAuthConfig::default();
        config.token.ttl = MAX_TOKEN_TTL;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_priority_fails_validation() {
        let mut config = QrAuthConfig::default();
        config.extraction.priority = vec![TokenSource::Header, TokenSource::Header];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_blank_source_name_fails_validation() {
        let mut config = QrAuthConfig::default();
        config.extraction.header_name = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("extraction.header_name"));
    }

    #[test]
    fn test_blank_name_of_unused_source_is_allowed() {
        let mut config = QrAuthConfig::default();
        config.extraction.priority = vec![TokenSource::Header];
        config.extraction.cookie_name = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_same_site_fails_validation() {
        let mut config = QrAuthConfig::default();
        config.session.same_site = "sometimes".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let config: QrAuthConfig = toml::from_str(
            r#"
            path_pattern = "/auth/qr/**"

            [token]
            ttl = "90s"

            [extraction]
            priority = ["header", "parameter"]
            header_name = "X-Qr-Token"
            "#,
        )
        .unwrap();

        assert_eq!(config.path_pattern, "/auth/qr/**");
        assert_eq!(config.token.ttl, Duration::from_secs(90));
        assert_eq!(config.token.grace_period, Duration::from_secs(300));
        assert_eq!(
            config.extraction.priority,
            vec![TokenSource::Header, TokenSource::Parameter]
        );
        assert_eq!(config.extraction.header_name, "X-Qr-Token");
        assert_eq!(config.extraction.param_name, "token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");
    }
}
