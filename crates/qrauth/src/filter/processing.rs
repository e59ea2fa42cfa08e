//! QR authorization processing filter.
//!
//! Per request the filter moves through
//! `Received → Extracted → Validated → Resolved`:
//!
//! 1. Requests outside the configured path pattern (or method list) pass
//!    through untouched.
//! 2. The token is extracted from cookie/header/parameter.
//! 3. The [`AuthenticationManager`] validates it.
//! 4. On success the session strategy and remember-me services run, then
//!    the success handler builds the response; on failure the failure
//!    handler does. Errors from any of these go to the entry point.
//!
//! # Example
//!
//! ```ignore
//! let filter = QrAuthorizationFilter::builder(config.qrauth.clone())
//!     .provider(Arc::new(QrAuthorizationProvider::new(store, resolver)))
//!     .session_strategy(sessions.clone())
//!     .listener(Arc::new(TracingAuthenticationListener))
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/api/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(
//!         Arc::new(filter),
//!         qr_authorization_middleware,
//!     ));
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::AuthResult;
use crate::audit::AuthenticationListener;
use crate::config::QrAuthConfig;
use crate::error::QrAuthError;
use crate::handlers::{
    AuthenticationEntryPoint, AuthenticationFailureHandler, AuthenticationSuccessHandler,
    HandlerRegistry, JsonEntryPoint, JsonFailureHandler, JsonSuccessHandler,
    RedirectFailureHandler, RedirectSuccessHandler, RequestMatcher,
};
use crate::provider::{AuthenticationManager, AuthenticationProvider};
use crate::types::{AuthenticationFailure, AuthenticationOutcome, AuthorizationRequestContext};

use super::extract::TokenExtractor;
use super::pattern::PathPattern;
use super::remember_me::RememberMeServices;
use super::session::SessionAuthenticationStrategy;

/// The QR authorization filter.
pub struct QrAuthorizationFilter {
    enabled: bool,
    pattern: PathPattern,
    methods: Vec<Method>,
    extractor: TokenExtractor,
    manager: AuthenticationManager,
    success_handler: Arc<dyn AuthenticationSuccessHandler>,
    failure_handler: Arc<dyn AuthenticationFailureHandler>,
    entry_point: Arc<dyn AuthenticationEntryPoint>,
    session_strategy: Option<Arc<dyn SessionAuthenticationStrategy>>,
    remember_me: Option<Arc<dyn RememberMeServices>>,
    listeners: Vec<Arc<dyn AuthenticationListener>>,
}

impl QrAuthorizationFilter {
    /// Starts building a filter from configuration.
    #[must_use]
    pub fn builder(config: QrAuthConfig) -> QrAuthorizationFilterBuilder {
        QrAuthorizationFilterBuilder::new(config)
    }

    /// The activation pattern.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Activation gate: `true` if the filter handles this request.
    #[must_use]
    pub fn requires_authentication(&self, method: &Method, path: &str) -> bool {
        self.enabled
            && self.pattern.matches(path)
            && (self.methods.is_empty() || self.methods.contains(method))
    }

    /// Runs extraction, validation and resolution for a matching request.
    ///
    /// # Errors
    ///
    /// Returns errors raised by the session strategy, remember-me services
    /// or handlers. Callers route them to the entry point.
    pub async fn process(&self, request: &Parts) -> AuthResult<Response> {
        let context = self.extractor.extract(request);

        match self.manager.authenticate(&context).await {
            AuthenticationOutcome::Success(principal) => {
                let mut headers = HeaderMap::new();
                if let Some(strategy) = &self.session_strategy {
                    strategy
                        .on_authentication(request, &mut headers, &principal)
                        .await?;
                }
                if let Some(remember_me) = &self.remember_me {
                    remember_me
                        .login_success(request, &mut headers, &principal)
                        .await?;
                }
                for listener in &self.listeners {
                    listener.on_success(&context, &principal);
                }

                let mut response = self.success_handler.on_success(request, &principal).await?;
                for (name, value) in &headers {
                    response.headers_mut().append(name.clone(), value.clone());
                }
                Ok(response)
            }
            AuthenticationOutcome::Failure(failure) => {
                self.notify_failure(&context, &failure);
                self.failure_handler.on_failure(request, &failure).await
            }
        }
    }

    /// Renders an error through the entry point.
    pub async fn commence(&self, request: &Parts, error: &QrAuthError) -> Response {
        self.entry_point.commence(request, error).await
    }

    fn notify_failure(
        &self,
        context: &AuthorizationRequestContext,
        failure: &AuthenticationFailure,
    ) {
        for listener in &self.listeners {
            listener.on_failure(context, failure);
        }
    }
}

impl std::fmt::Debug for QrAuthorizationFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrAuthorizationFilter")
            .field("enabled", &self.enabled)
            .field("pattern", &self.pattern.as_str())
            .field("methods", &self.methods)
            .field("manager", &self.manager)
            .field("session_strategy", &self.session_strategy.is_some())
            .field("remember_me", &self.remember_me.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Builder for [`QrAuthorizationFilter`].
///
/// Collaborators not supplied explicitly fall back to:
///
/// - success: JSON, or a redirect to `redirect.success_url` for non-JSON
///   requests when configured
/// - failure: JSON, or a redirect to `redirect.failure_url` for non-JSON
///   requests when configured
/// - entry point: JSON
/// - no session strategy, no remember-me, no listeners
pub struct QrAuthorizationFilterBuilder {
    config: QrAuthConfig,
    manager: AuthenticationManager,
    success_handler: Option<Arc<dyn AuthenticationSuccessHandler>>,
    failure_handler: Option<Arc<dyn AuthenticationFailureHandler>>,
    entry_point: Option<Arc<dyn AuthenticationEntryPoint>>,
    session_strategy: Option<Arc<dyn SessionAuthenticationStrategy>>,
    remember_me: Option<Arc<dyn RememberMeServices>>,
    listeners: Vec<Arc<dyn AuthenticationListener>>,
}

impl QrAuthorizationFilterBuilder {
    fn new(config: QrAuthConfig) -> Self {
        Self {
            config,
            manager: AuthenticationManager::new(),
            success_handler: None,
            failure_handler: None,
            entry_point: None,
            session_strategy: None,
            remember_me: None,
            listeners: Vec::new(),
        }
    }

    /// Appends an authentication provider.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.manager = self.manager.with_provider(provider);
        self
    }

    /// Replaces the authentication manager.
    #[must_use]
    pub fn manager(mut self, manager: AuthenticationManager) -> Self {
        self.manager = manager;
        self
    }

    /// Sets the success handler.
    #[must_use]
    pub fn success_handler(mut self, handler: Arc<dyn AuthenticationSuccessHandler>) -> Self {
        self.success_handler = Some(handler);
        self
    }

    /// Sets the failure handler.
    #[must_use]
    pub fn failure_handler(mut self, handler: Arc<dyn AuthenticationFailureHandler>) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    /// Sets the entry point.
    #[must_use]
    pub fn entry_point(mut self, entry_point: Arc<dyn AuthenticationEntryPoint>) -> Self {
        self.entry_point = Some(entry_point);
        self
    }

    /// Sets the session authentication strategy.
    #[must_use]
    pub fn session_strategy(mut self, strategy: Arc<dyn SessionAuthenticationStrategy>) -> Self {
        self.session_strategy = Some(strategy);
        self
    }

    /// Sets the remember-me services.
    #[must_use]
    pub fn remember_me(mut self, services: Arc<dyn RememberMeServices>) -> Self {
        self.remember_me = Some(services);
        self
    }

    /// Appends an authentication listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn AuthenticationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validates configuration and assembles the filter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid, a
    /// method name cannot be parsed, or no provider was registered.
    pub fn build(self) -> AuthResult<QrAuthorizationFilter> {
        self.config
            .validate()
            .map_err(|e| QrAuthError::configuration(e.to_string()))?;

        if self.manager.is_empty() {
            return Err(QrAuthError::configuration(
                "no authentication provider registered",
            ));
        }

        let pattern = PathPattern::compile(&self.config.path_pattern)?;
        let methods = self
            .config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| QrAuthError::configuration(format!("invalid HTTP method: {}", m)))
            })
            .collect::<AuthResult<Vec<_>>>()?;

        let success_handler = self.success_handler.unwrap_or_else(|| {
            let mut registry = HandlerRegistry::<dyn AuthenticationSuccessHandler>::new(Arc::new(
                JsonSuccessHandler,
            ));
            if let Some(url) = &self.config.redirect.success_url {
                registry = registry.register(
                    RequestMatcher::not(RequestMatcher::AcceptsJson),
                    Arc::new(RedirectSuccessHandler::new(url.clone())),
                );
            }
            Arc::new(registry)
        });

        let failure_handler = self.failure_handler.unwrap_or_else(|| {
            let mut registry = HandlerRegistry::<dyn AuthenticationFailureHandler>::new(Arc::new(
                JsonFailureHandler,
            ));
            if let Some(url) = &self.config.redirect.failure_url {
                registry = registry.register(
                    RequestMatcher::not(RequestMatcher::AcceptsJson),
                    Arc::new(RedirectFailureHandler::new(url.clone())),
                );
            }
            Arc::new(registry)
        });

        let entry_point = self
            .entry_point
            .unwrap_or_else(|| Arc::new(JsonEntryPoint));

        tracing::debug!(
            pattern = %pattern,
            methods = ?methods,
            providers = self.manager.len(),
            "QR authorization filter assembled"
        );

        Ok(QrAuthorizationFilter {
            enabled: self.config.enabled,
            pattern,
            methods,
            extractor: TokenExtractor::new(&self.config.extraction),
            manager: self.manager,
            success_handler,
            failure_handler,
            entry_point,
            session_strategy: self.session_strategy,
            remember_me: self.remember_me,
            listeners: self.listeners,
        })
    }
}

/// Axum middleware running the QR authorization filter.
///
/// Requests outside the activation gate reach the inner service untouched.
/// Matching requests are answered by the filter's handlers; the inner
/// service is not called for them.
pub async fn qr_authorization_middleware(
    State(filter): State<Arc<QrAuthorizationFilter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !filter.requires_authentication(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let (parts, _body) = req.into_parts();
    match filter.process(&parts).await {
        Ok(response) => response,
        Err(e) => filter.commence(&parts, &e).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::header::{LOCATION, SET_COOKIE};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;
    use crate::config::SessionConfig;
    use crate::error::FailureKind;
    use crate::filter::session::InMemorySessionRegistry;
    use crate::types::Principal;

    struct StaticProvider(AuthenticationOutcome);

    #[async_trait]
    impl AuthenticationProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn supports(&self, _context: &AuthorizationRequestContext) -> bool {
            true
        }

        async fn authenticate(&self, _context: &AuthorizationRequestContext) -> AuthenticationOutcome {
            self.0.clone()
        }
    }

    struct FailingStrategy;

    #[async_trait]
    impl SessionAuthenticationStrategy for FailingStrategy {
        async fn on_authentication(
            &self,
            _request: &Parts,
            _response_headers: &mut HeaderMap,
            _principal: &Principal,
        ) -> AuthResult<()> {
            Err(QrAuthError::handler("session store unavailable"))
        }
    }

    struct CookieSettingHandler;

    #[async_trait]
    impl AuthenticationSuccessHandler for CookieSettingHandler {
        async fn on_success(&self, _request: &Parts, _principal: &Principal) -> AuthResult<Response> {
            Ok(([(SET_COOKIE, "theme=dark")], "ok").into_response())
        }
    }

    #[derive(Default)]
    struct CountingListener {
        events: Mutex<Vec<&'static str>>,
    }

    impl AuthenticationListener for CountingListener {
        fn on_success(&self, _context: &AuthorizationRequestContext, _principal: &Principal) {
            self.events.lock().unwrap().push("success");
        }

        fn on_failure(&self, _context: &AuthorizationRequestContext, _failure: &AuthenticationFailure) {
            self.events.lock().unwrap().push("failure");
        }
    }

    fn success() -> Arc<StaticProvider> {
        Arc::new(StaticProvider(AuthenticationOutcome::Success(Principal::new(
            "U1", "alice",
        ))))
    }

    fn failure(kind: FailureKind) -> Arc<StaticProvider> {
        Arc::new(StaticProvider(AuthenticationOutcome::failure(kind)))
    }

    fn request(method: Method, uri: &str, accept: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("accept", accept)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_activation_gate() {
        let mut config = QrAuthConfig::default();
        config.path_pattern = "/login/**".to_string();
        config.methods = vec!["post".to_string()];
        let filter = QrAuthorizationFilter::builder(config)
            .provider(success())
            .build()
            .unwrap();

        assert!(filter.requires_authentication(&Method::POST, "/login/qrcode"));
        assert!(!filter.requires_authentication(&Method::GET, "/login/qrcode"));
        assert!(!filter.requires_authentication(&Method::POST, "/api/me"));
    }

    #[test]
    fn test_disabled_filter_never_activates() {
        let config = QrAuthConfig {
            enabled: false,
            ..QrAuthConfig::default()
        };
        let filter = QrAuthorizationFilter::builder(config)
            .provider(success())
            .build()
            .unwrap();
        assert!(!filter.requires_authentication(&Method::GET, "/login/qrcode"));
    }

    #[test]
    fn test_build_requires_provider_and_valid_methods() {
        let err = QrAuthorizationFilter::builder(QrAuthConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, QrAuthError::Configuration { .. }));

        let config = QrAuthConfig {
            methods: vec!["NOT A METHOD".to_string()],
            ..QrAuthConfig::default()
        };
        assert!(
            QrAuthorizationFilter::builder(config)
                .provider(success())
                .build()
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_success_merges_session_cookie_into_handler_response() {
        let filter = QrAuthorizationFilter::builder(QrAuthConfig::default())
            .provider(success())
            .session_strategy(Arc::new(InMemorySessionRegistry::new(SessionConfig::default())))
            .success_handler(Arc::new(CookieSettingHandler))
            .build()
            .unwrap();

        let response = filter
            .process(&request(Method::GET, "/login/qrcode", "application/json"))
            .await
            .unwrap();

        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("theme=dark")));
        assert!(cookies.iter().any(|c| c.starts_with("QRSESSION=")));
    }

    #[tokio::test]
    async fn test_failure_routes_to_failure_handler() {
        let listener = Arc::new(CountingListener::default());
        let filter = QrAuthorizationFilter::builder(QrAuthConfig::default())
            .provider(failure(FailureKind::CredentialReused))
            .listener(listener.clone())
            .build()
            .unwrap();

        let response = filter
            .process(&request(Method::GET, "/login/qrcode", "application/json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "credential_reused");
        assert_eq!(*listener.events.lock().unwrap(), vec!["failure"]);
    }

    #[tokio::test]
    async fn test_strategy_error_propagates() {
        let listener = Arc::new(CountingListener::default());
        let filter = QrAuthorizationFilter::builder(QrAuthConfig::default())
            .provider(success())
            .session_strategy(Arc::new(FailingStrategy))
            .listener(listener.clone())
            .build()
            .unwrap();

        let parts = request(Method::GET, "/login/qrcode", "application/json");
        let err = filter.process(&parts).await.unwrap_err();
        assert!(matches!(err, QrAuthError::Handler { .. }));
        // Listeners only hear about completed authentications
        assert!(listener.events.lock().unwrap().is_empty());

        let response = filter.commence(&parts, &err).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_configured_redirects_apply_to_browser_requests() {
        let mut config = QrAuthConfig::default();
        config.redirect.success_url = Some("/home".to_string());
        config.redirect.failure_url = Some("/login".to_string());

        let ok = QrAuthorizationFilter::builder(config.clone())
            .provider(success())
            .build()
            .unwrap();
        let response = ok
            .process(&request(Method::GET, "/login/qrcode", "text/html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/home");

        let response = ok
            .process(&request(Method::GET, "/login/qrcode", "application/json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let failed = QrAuthorizationFilter::builder(config)
            .provider(failure(FailureKind::CredentialExpired))
            .build()
            .unwrap();
        let response = failed
            .process(&request(Method::GET, "/login/qrcode", "text/html"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/login?error=credential_expired"
        );
    }
}
