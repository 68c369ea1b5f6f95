//! Tower middleware applied to every route, fallback included.
//!
//! [`decorate_response`] runs around each handler: it captures the
//! inbound headers and peer address, echoes the headers onto the
//! response, appends the `VERSION` header, counts the status and emits
//! the access line ([`access_log`]), also when the request is dropped
//! before the handler finishes.

pub mod access_log;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::chain::client_ip::resolve_client_ip;
use crate::chain::headers;
use crate::server::AppState;

use self::access_log::AccessGuard;

pub async fn decorate_response(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let inbound = req.headers().clone();
    // Absent when the router is driven without a socket (e.g. `oneshot`)
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let mut access = AccessGuard::new(Arc::clone(&state), resolve_client_ip(&inbound, &peer));

    let mut response = next.run(req).await;

    headers::echo_headers(&inbound, response.headers_mut());
    headers::append_version(response.headers_mut(), &state.version);

    access.complete(response.status().as_u16());
    response
}
