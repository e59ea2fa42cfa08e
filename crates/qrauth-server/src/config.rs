use qrauth::{Principal, QrAuthConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    /// QR login configuration
    #[serde(default)]
    pub qrauth: QrAuthConfig,
    /// Principals seeded into the in-memory user directory
    #[serde(default)]
    pub users: Vec<Principal>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Users validation
        for user in &self.users {
            if user.id.trim().is_empty() {
                return Err(format!("users: '{}' has an empty id", user.username));
            }
        }
        // QR login validation
        self.qrauth
            .validate()
            .map_err(|e| format!("qrauth config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Keep QR login audit events at `info` regardless of `level`.
    #[serde(default = "default_audit")]
    pub audit: bool,
}
fn default_log_level() -> String {
    "info".into()
}
fn default_audit() -> bool {
    true
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            audit: default_audit(),
        }
    }
}

/// Cross-origin settings for the browser page polling token status.
///
/// An empty list allows any origin.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub mod loader {
    use super::{AppConfig, LoadError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, LoadError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("qrauth.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., QRAUTH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("QRAUTH")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate().map_err(LoadError::Invalid)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().port(), 8080);
        assert_eq!(cfg.qrauth.path_pattern, "/login/qrcode");
    }

    #[test]
    fn test_parse_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [logging]
            level = "debug"
            audit = false

            [cors]
            allowed_origins = ["https://login.example.com"]

            [qrauth]
            path_pattern = "/auth/**/qrcode"

            [qrauth.token]
            ttl = "90s"

            [[users]]
            id = "U1"
            username = "alice"
            authorities = ["user"]
            "#,
        )
        .unwrap();

        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().to_string(), "127.0.0.1:9000");
        assert!(!cfg.logging.audit);
        assert_eq!(cfg.cors.allowed_origins.len(), 1);
        assert_eq!(cfg.qrauth.token.ttl, Duration::from_secs(90));
        assert_eq!(cfg.users[0].username, "alice");
        assert!(cfg.users[0].has_authority("user"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_rejects_invalid_qrauth_section() {
        let mut cfg = AppConfig::default();
        cfg.qrauth.path_pattern = "login".into();
        assert!(cfg.validate().unwrap_err().starts_with("qrauth config error"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = loader::load_config(Some("does-not-exist.toml")).unwrap();
        assert_eq!(cfg.server.port, 8080);
    }
}
