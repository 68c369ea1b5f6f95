//! Client address resolution for access logging.
//!
//! Proxy headers win over the socket peer: `X-Real-IP` first, then
//! `X-Forwarded-For`, then the host part of the peer address. Header
//! values are taken as-is, without IP syntax validation.

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

const IPV6_LOOPBACK: &str = "::1";
const IPV4_LOOPBACK: &str = "127.0.0.1";

#[must_use]
pub fn resolve_client_ip(headers: &HeaderMap, peer: &str) -> String {
    let resolved = first_non_empty(headers, X_REAL_IP)
        .or_else(|| first_non_empty(headers, X_FORWARDED_FOR))
        .map_or_else(|| peer_host(peer).to_string(), str::to_string);

    if resolved == IPV6_LOOPBACK {
        IPV4_LOOPBACK.to_string()
    } else {
        resolved
    }
}

fn first_non_empty<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Strip the port from a peer address.
///
/// Accepts `1.2.3.4:80`, `[::1]:80`, bare IPv4, bracketed IPv6 without a
/// port, and the unbracketed `::1:54321` form. An unbracketed address
/// with several colons is always read as `host:port`, everything after
/// the last colon being the port.
fn peer_host(peer: &str) -> &str {
    if let Ok(addr) = peer.parse::<SocketAddr>() {
        let host = match addr {
            SocketAddr::V4(_) => peer.rsplit_once(':').map_or(peer, |(host, _)| host),
            SocketAddr::V6(_) => peer
                .rsplit_once("]:")
                .map_or(peer, |(host, _)| host.trim_start_matches('[')),
        };
        return host;
    }
    if let Some(inner) = peer.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        return inner;
    }
    if !peer.contains(':') {
        return peer;
    }
    peer.rsplit_once(':').map_or(peer, |(host, _port)| host)
}
