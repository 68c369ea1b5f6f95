//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the version
//! marker, HTTP client, chain targets, delay range, stats and uptime),
//! [`build_router`] for the route table and middleware layers,
//! [`build_http_client`] for the connection-pooled hyper client,
//! [`serve`] for the bounded graceful shutdown, and [`shutdown_signal`]
//! for SIGTERM / Ctrl+C handling.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};
use axum::routing::any;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::chain::delay::DelaySimulator;
use crate::chain::{self, ChainTargets};
use crate::error::HttpChainError;
use crate::health::health_handler;
use crate::metrics::{metrics_handler, Stats};
use crate::middleware::decorate_response;

pub const DEFAULT_OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub version: HeaderValue,
    pub http_client: HttpClient,
    pub chain: ChainTargets,
    pub delay: DelaySimulator,
    pub outbound_timeout: Duration,
    pub stats: Stats,
}

impl AppState {
    #[must_use]
    pub fn new(
        version: HeaderValue,
        chain: ChainTargets,
        delay: DelaySimulator,
        outbound_timeout: Duration,
    ) -> Self {
        Self {
            version,
            http_client: build_http_client(),
            chain,
            delay,
            outbound_timeout,
            stats: Stats::new(),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", any(health_handler))
        .route("/hello/golang", any(chain::hello_golang))
        .route("/hello/{service}", any(chain::hello_service))
        .route("/metrics", any(metrics_handler))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    decorate_response,
                )),
        )
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Listen address in `host:port` form; a bare `:port` binds every
/// interface.
#[must_use]
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Serve `router` until `shutdown` resolves, then give in-flight
/// requests `grace` to finish.
///
/// Returns [`HttpChainError::ShutdownTimeout`] when requests are still
/// running after the grace period; the server task is aborted and those
/// requests are dropped.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: F,
    grace: Duration,
) -> Result<(), HttpChainError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);

    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.changed().await;
        })
        .await
    });

    tokio::select! {
        joined = &mut server => return Ok(joined??),
        () = shutdown => {}
    }

    tracing::info!(grace_secs = grace.as_secs_f64(), "server stopping");
    let _ = stop_tx.send(true);

    if let Ok(joined) = tokio::time::timeout(grace, &mut server).await {
        joined??;
        Ok(())
    } else {
        server.abort();
        Err(HttpChainError::ShutdownTimeout { grace })
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
