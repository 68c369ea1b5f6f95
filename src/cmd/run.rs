//! `httpchain run` — start the HTTP server.
//!
//! Validates the configuration, binds the listener, and serves until
//! SIGTERM / Ctrl+C, then waits up to the grace period for in-flight
//! requests.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::chain::delay::DelaySimulator;
use crate::chain::ChainTargets;
use crate::cli::RunArgs;
use crate::error::HttpChainError;
use crate::logging;
use crate::server::{self, AppState};

pub async fn execute(args: RunArgs) -> Result<(), HttpChainError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let state = Arc::new(build_state(&args)?);
    let router = server::build_router(state);

    let bind_addr = server::normalize_listen_addr(&args.addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        addr = %local_addr,
        version = %args.version_tag,
        git = env!("HTTPCHAIN_GIT_SHORT"),
        profile = env!("HTTPCHAIN_BUILD_PROFILE"),
        service2 = %args.service2_url,
        service3 = %args.service3_url,
        "httpchain started"
    );

    server::serve(
        listener,
        router,
        server::shutdown_signal(),
        Duration::from_secs(args.grace_period_secs),
    )
    .await?;

    tracing::info!("httpchain exited properly");
    Ok(())
}

/// Validate the run flags and assemble the shared state.
pub fn build_state(args: &RunArgs) -> Result<AppState, HttpChainError> {
    let version =
        HeaderValue::from_str(&args.version_tag).map_err(|_| HttpChainError::InvalidVersion {
            value: args.version_tag.clone(),
        })?;

    let delay = DelaySimulator::new(args.min_delay_ms, args.max_delay_ms)?;

    for (service, base) in [
        ("service2", &args.service2_url),
        ("service3", &args.service3_url),
    ] {
        url::Url::parse(base)
            .map_err(|source| HttpChainError::InvalidUpstream { service, source })?;
    }

    let chain = ChainTargets {
        service2: args.service2_url.clone(),
        service3: args.service3_url.clone(),
    };

    Ok(AppState::new(
        version,
        chain,
        delay,
        Duration::from_millis(args.timeout),
    ))
}
