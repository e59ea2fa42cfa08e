pub mod config;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, CorsConfig, LoadError, LoggingConfig, ServerConfig};
pub use observability::{apply_logging, init_tracing};
pub use server::{AppState, QrAuthServer, ServerBuilder, build_app};
