use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
};
use qrauth::audit::TracingAuthenticationListener;
use qrauth::filter::{InMemorySessionRegistry, TokenRememberMeServices};
use qrauth::http::{TokenEndpointState, token_routes};
use qrauth::middleware::{SessionAuth, SessionState, error_body};
use qrauth::{
    InMemoryCredentialStore, InMemoryUserResolver, QrAuthorizationFilter,
    QrAuthorizationProvider, TokenService, qr_authorization_middleware,
};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, CorsConfig};
use crate::middleware::{self as app_middleware, REQUEST_ID_HEADER};

/// Shared application state.
///
/// Everything is assembled once at startup; handlers only read through `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
    pub sessions: Arc<InMemorySessionRegistry>,
    pub remember_me: Option<Arc<TokenRememberMeServices>>,
    pub users: Arc<InMemoryUserResolver>,
    pub filter: Arc<QrAuthorizationFilter>,
}

impl AppState {
    /// Wires the store, user directory, provider and filter from configuration.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let qr = &cfg.qrauth;

        let store = Arc::new(InMemoryCredentialStore::new());
        let users = Arc::new(InMemoryUserResolver::with_principals(cfg.users.clone()));
        let token_service = Arc::new(TokenService::from_config(store.clone(), &qr.token));
        let sessions = InMemorySessionRegistry::shared(qr.session.clone());
        let remember_me = qr.remember_me.enabled.then(|| {
            Arc::new(TokenRememberMeServices::new(
                qr.remember_me.clone(),
                qr.session.clone(),
            ))
        });

        let provider = QrAuthorizationProvider::new(store, users.clone())
            .with_lookup_timeout(qr.store.lookup_timeout);

        let mut builder = QrAuthorizationFilter::builder(qr.clone())
            .provider(Arc::new(provider))
            .session_strategy(sessions.clone())
            .listener(Arc::new(TracingAuthenticationListener));
        if let Some(remember_me) = &remember_me {
            builder = builder.remember_me(remember_me.clone());
        }
        let filter = Arc::new(builder.build()?);

        tracing::info!(
            users = cfg.users.len(),
            login_path = %filter.pattern(),
            remember_me = remember_me.is_some(),
            "QR login assembled"
        );

        Ok(Self {
            token_service,
            sessions,
            remember_me,
            users,
            filter,
        })
    }

    /// Evicts sessions and remember-me logins past their lifetime.
    pub fn cleanup_expired_sessions(&self) -> u64 {
        let sessions = self.sessions.cleanup_expired();
        let remembered = self
            .remember_me
            .as_ref()
            .map_or(0, |remember_me| remember_me.cleanup_expired());
        if sessions + remembered > 0 {
            tracing::debug!(sessions, remembered, "Evicted expired sessions");
        }
        sessions + remembered
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(state: &AppState) -> Self {
        let session_state = SessionState::new(state.sessions.clone());
        match &state.remember_me {
            Some(remember_me) => session_state.with_remember_me(remember_me.clone()),
            None => session_state,
        }
    }
}

impl FromRef<AppState> for TokenEndpointState {
    fn from_ref(state: &AppState) -> Self {
        TokenEndpointState::new(state.token_service.clone())
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn me(SessionAuth(principal): SessionAuth) -> Json<Value> {
    Json(json!({ "principal": principal }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(error_body("not_found", "No route matches the request")),
    )
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let filter = state.filter.clone();
    let tokens = token_routes(TokenEndpointState::from_ref(&state));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/me", get(me))
        .with_state(state)
        .merge(tokens)
        // The login path has no route of its own; the filter answers it.
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            filter,
            qr_authorization_middleware,
        ))
        // Outer stack (order: request id -> cors -> trace -> body limit)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(cors_layer(&cfg.cors))
                // `Cors` needs a `Default` response body; box the traced body.
                .map_response(IntoResponse::into_response)
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            let req_id = req
                                .extensions()
                                .get::<HeaderValue>()
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(axum::extract::DefaultBodyLimit::max(body_limit)),
        )
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    if cfg.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub struct QrAuthServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
    sweep_interval: std::time::Duration,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<QrAuthServer> {
        let state = AppState::from_config(&self.config)?;
        let app = build_app(&self.config, state.clone());

        Ok(QrAuthServer {
            addr: self.addr,
            app,
            state,
            sweep_interval: self.config.qrauth.store.sweep_interval,
        })
    }
}

impl QrAuthServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let sessions = self.state.clone();
        let sweeper = self
            .state
            .token_service
            .clone()
            .spawn_sweeper_with(self.sweep_interval, move || {
                sessions.cleanup_expired_sessions();
            });

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        sweeper.abort();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
