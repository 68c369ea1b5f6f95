//! The three-hop service chain and the greeting handlers.
//!
//! `/hello/service1` calls service2, `/hello/service2` calls service3,
//! and `/hello/service3` ends the chain by listing the headers it
//! received. Submodules handle client address resolution
//! ([`client_ip`]), header echo and normalization ([`headers`]),
//! synthetic latency ([`delay`]) and the outbound call ([`forward`]).

pub mod client_ip;
pub mod delay;
pub mod forward;
pub mod headers;

use std::fmt::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, BytesMut};

use crate::metrics::ExecutionTimer;
use crate::server::AppState;

pub const DEFAULT_SERVICE2_URL: &str = "http://httpserver-service2";
pub const DEFAULT_SERVICE3_URL: &str = "http://httpserver-service3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPosition {
    Service1,
    Service2,
    Service3,
}

impl ChainPosition {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "service1" => Some(Self::Service1),
            "service2" => Some(Self::Service2),
            "service3" => Some(Self::Service3),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Service1 => "service1",
            Self::Service2 => "service2",
            Self::Service3 => "service3",
        }
    }

    #[must_use]
    pub const fn greeting(self) -> &'static str {
        match self {
            Self::Service1 => "Hello, Service1!\n",
            Self::Service2 => "Hello, Service2!\n",
            Self::Service3 => "Hello, Service3!\n",
        }
    }

    /// The position this one forwards to; `None` ends the chain.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Service1 => Some(Self::Service2),
            Self::Service2 => Some(Self::Service3),
            Self::Service3 => None,
        }
    }
}

/// Base URLs of the downstream chain positions.
#[derive(Debug, Clone)]
pub struct ChainTargets {
    pub service2: String,
    pub service3: String,
}

impl Default for ChainTargets {
    fn default() -> Self {
        Self {
            service2: DEFAULT_SERVICE2_URL.into(),
            service3: DEFAULT_SERVICE3_URL.into(),
        }
    }
}

impl ChainTargets {
    /// Full URL of the hello endpoint at `position`. `Service1` is never
    /// a downstream hop and has no URL.
    #[must_use]
    pub fn url_for(&self, position: ChainPosition) -> Option<String> {
        let base = match position {
            ChainPosition::Service1 => return None,
            ChainPosition::Service2 => &self.service2,
            ChainPosition::Service3 => &self.service3,
        };
        Some(format!(
            "{}/hello/{}",
            base.trim_end_matches('/'),
            position.name()
        ))
    }
}

#[allow(clippy::cast_possible_truncation)]
pub async fn hello_golang(State(state): State<Arc<AppState>>) -> Response {
    tracing::debug!("entering hello golang handler");
    let _timer = ExecutionTimer::start(&state.stats);
    let delay = state.delay.pause().await;
    tracing::debug!(delay_ms = delay.as_millis() as u64, "responding");
    (StatusCode::OK, "Hello, Golang!").into_response()
}

#[allow(clippy::cast_possible_truncation)]
pub async fn hello_service(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    req_headers: HeaderMap,
) -> Response {
    let Some(position) = ChainPosition::from_name(&service) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    tracing::debug!(service = position.name(), "entering hello service handler");
    let _timer = ExecutionTimer::start(&state.stats);
    let delay = state.delay.pause().await;

    let mut body = BytesMut::new();
    body.put_slice(position.greeting().as_bytes());

    match position.next() {
        Some(next) => relay_next_hop(&state, next, &req_headers, &mut body).await,
        None => list_headers(&req_headers, &mut body),
    }

    tracing::debug!(
        service = position.name(),
        delay_ms = delay.as_millis() as u64,
        "responding"
    );
    (StatusCode::OK, Body::from(body.freeze())).into_response()
}

/// Call `next` and append its reply in wire form. Failures are logged
/// and counted; the caller still answers 200 with its greeting.
async fn relay_next_hop(
    state: &AppState,
    next: ChainPosition,
    req_headers: &HeaderMap,
    body: &mut BytesMut,
) {
    let Some(url) = state.chain.url_for(next) else {
        return;
    };
    let forwarded = headers::normalize_for_forward(req_headers);
    tracing::info!(target = %url, headers = ?forwarded, "forwarding to next hop");

    match forward::call_next_hop(&state.http_client, &url, forwarded, state.outbound_timeout).await
    {
        Ok(downstream) => {
            tracing::info!(target = %url, status = downstream.status.as_u16(), "next hop call succeeded");
            body.put_slice(&downstream.to_wire());
        }
        Err(e) => {
            state.stats.downstream_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(target = %url, error = %e, "next hop call failed");
        }
    }
}

/// One `name: value` line per received header value. `Host` addresses
/// this hop and is not part of the listing.
fn list_headers(req_headers: &HeaderMap, body: &mut BytesMut) {
    let mut listing = String::new();
    for (name, value) in req_headers {
        if *name == hyper::header::HOST {
            continue;
        }
        // write! to String is infallible
        let _ = writeln!(listing, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    body.put_slice(listing.as_bytes());
}
