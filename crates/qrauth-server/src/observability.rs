//! Tracing setup with a reloadable level.
//!
//! Login audit events go to the `qrauth::audit` target. They stay enabled at
//! `info` even when the configured level is stricter, unless
//! `logging.audit = false`.

use std::sync::OnceLock;

use qrauth::audit::AUDIT_TARGET;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with(&LoggingConfig::default());
}

pub fn init_tracing_with(logging: &LoggingConfig) {
    // RUST_LOG, when set and valid, replaces the configured filter entirely.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| build_filter(logging));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Swaps in the configured filter once the configuration is loaded.
///
/// No-op while `RUST_LOG` is set or before [`init_tracing`] ran.
pub fn apply_logging(logging: &LoggingConfig) {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let filter = build_filter(logging);
        if let Err(e) = handle.modify(|f| *f = filter) {
            tracing::warn!(error = %e, "Failed to apply logging level");
            return;
        }
        tracing::debug!(level = %logging.level, audit = logging.audit, "Logging level applied");
    }
}

/// Filter for the configured level, with the audit target pinned to `info`.
pub fn build_filter(logging: &LoggingConfig) -> EnvFilter {
    let level = logging.level.to_ascii_lowercase();
    let audit = if logging.audit { "info" } else { "off" };
    EnvFilter::new(format!("{level},{AUDIT_TARGET}={audit}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_target_survives_stricter_level() {
        let logging = LoggingConfig {
            level: "WARN".into(),
            audit: true,
        };
        let filter = build_filter(&logging).to_string().to_ascii_lowercase();
        assert!(filter.contains("warn"));
        assert!(filter.contains("qrauth::audit=info"));
    }

    #[test]
    fn test_audit_can_be_silenced() {
        let logging = LoggingConfig {
            level: "debug".into(),
            audit: false,
        };
        let filter = build_filter(&logging).to_string().to_ascii_lowercase();
        assert!(filter.contains("qrauth::audit=off"));
    }
}
