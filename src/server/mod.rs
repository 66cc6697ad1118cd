//! HTTP surface: routing, request discipline, CORS, request logging and graceful shutdown

pub mod error;
pub mod extract;
pub mod logging;
pub mod routes;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::middleware;
use coding_expert_core::config::ServerConfig;
use coding_expert_core::{ErrorCode, Runtime};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

pub use error::ApiError;

/// Build the application router
pub fn router(runtime: Runtime) -> Router {
    let server = &runtime.config().server;
    let body_limit = DefaultBodyLimit::max(server.request_max_bytes);
    let cors = cors_layer(server);

    Router::new()
        .nest("/api/v1", routes::api_router())
        .fallback(not_found)
        .layer(body_limit)
        .layer(cors)
        .layer(middleware::from_fn(logging::log_requests))
        .with_state(runtime)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "no such endpoint")
}

/// Serve until `shutdown` resolves, then give in-flight requests the configured
/// grace period before returning.
pub async fn serve<F>(runtime: Runtime, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let grace = Duration::from_secs(runtime.config().server.shutdown_grace_seconds);
    let app = router(runtime).into_make_service_with_connect_info::<SocketAddr>();

    let drain = CancellationToken::new();
    let draining = drain.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { draining.cancelled().await })
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => return result.context("HTTP server failed"),
        () = shutdown => {
            info!(
                grace_seconds = grace.as_secs(),
                "shutdown requested; draining in-flight requests"
            );
            drain.cancel();
        }
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.context("HTTP server failed during shutdown"),
        Err(_) => {
            warn!("shutdown grace period elapsed; abandoning in-flight requests");
            Ok(())
        }
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
