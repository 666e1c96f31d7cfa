//! HTTP server setup and the redirect handler.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Ask the config manager for the rule matching the request host
//! - Enforce Basic credentials on protected rules
//! - Answer with a redirect, a challenge, or a JSON 404
//! - Stop accepting on the shutdown signal and drain in-flight requests

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, Uri},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::request::{basic_credentials, request_host, request_id, UuidRequestId};
use crate::http::response;
use crate::manager::ConfigManager;
use crate::observability::metrics;
use crate::routing::resolver::{redirect_status, resolve};
use crate::security::{authorize, challenge};

/// Upper bound on handling a single request, including any blocking reload.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: ConfigManager,
}

/// HTTP front end of the redirect server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(manager: ConfigManager) -> Self {
        let router = Self::build_router(AppState { manager });
        Self { router }
    }

    /// The fully layered router, e.g. for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let host = request_host(request.headers(), request.uri()).unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        host = %host,
                        path = %request.uri().path(),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

        Router::new()
            .route("/", any(redirect_handler))
            .route("/{*path}", any(redirect_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// Serve until a shutdown signal arrives, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every request is a redirect lookup.
async fn redirect_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let started = Instant::now();
    let response = handle_redirect(&state, &headers, &uri).await;
    metrics::record_request(response.status().as_u16(), started);
    response
}

async fn handle_redirect(state: &AppState, headers: &HeaderMap, uri: &Uri) -> Response {
    let Some(host) = request_host(headers, uri) else {
        tracing::debug!("Request without host");
        return response::not_found();
    };

    let rule = match state.manager.get_redirect(&host).await {
        Ok(Some(rule)) => rule,
        Ok(None) => {
            tracing::debug!(host = %host, "No redirect matched");
            return response::not_found();
        }
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Config manager unavailable");
            return response::unavailable();
        }
    };

    let credentials = basic_credentials(headers);
    if !authorize(&rule, credentials.as_ref()) {
        tracing::info!(
            host = %host,
            rule = %rule.from,
            presented = credentials.is_some(),
            "Unauthorized request to protected redirect"
        );
        return response::unauthorized(&challenge(&rule));
    }

    let location = resolve(&rule, &host, uri.path());
    tracing::debug!(host = %host, rule = %rule.from, location = %location, "Redirecting");
    response::redirect(redirect_status(&rule), &location)
}
