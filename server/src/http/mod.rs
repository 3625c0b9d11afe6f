//! Stateless HTTP façade over the extractor.
//!
//! One engine instance per request; the only shared state is the immutable
//! service configuration. Every response carries the hardening headers and
//! a JSON content type; each request is logged with a trace id.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, DefaultBodyLimit, Request};
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::info;
use uuid::Uuid;

/// Transport body cap; the `logs` field has its own lower cap.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// Per-request processing bound; also bounds the shutdown drain window.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable service configuration shared across requests.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub version: String,
}

impl AppConfig {
    /// Read `PORT` and `VERSION` from the environment, with defaults.
    pub fn from_env() -> (Self, u16) {
        let version = std::env::var("VERSION").unwrap_or_else(|_| "1.0.0".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        (Self { version }, port)
    }
}

pub fn router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/parse", post(handlers::parse_logs))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_requests))
                .layer(middleware::from_fn(security_headers))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(Extension(config)),
        )
}

/// Serve until SIGINT/SIGTERM, then drain within the request timeout.
pub async fn serve(listener: tokio::net::TcpListener, config: Arc<AppConfig>) -> std::io::Result<()> {
    let app = router(config);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining");
}

/// Hardening headers on every route, error responses included.
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-XSS-Protection",
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Structured per-request log line.
async fn log_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let trace_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();

    let response = next.run(request).await;

    info!(
        trace_id = %trace_id,
        method = %method,
        path = %path,
        status = %response.status(),
        duration_ms = start.elapsed().as_millis() as u64,
        remote_addr = %remote_addr,
        user_agent = %user_agent,
        "request processed"
    );
    response
}
