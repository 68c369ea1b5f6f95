//! Header echo, `VERSION` injection, and next-hop normalization.
//!
//! [`echo_headers`] copies every inbound header onto the response,
//! appending rather than overwriting so repeated names keep all their
//! values in order. [`normalize_for_forward`] builds the header set sent
//! to the next chain hop, keyed by lower-cased names.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const VERSION_HEADER: &str = "version";

/// Hop-by-hop headers, scoped to one connection. Never forwarded to
/// the next hop.
static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
        "content-length",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Framing of the inbound message body. hyper frames the response
/// itself, so these are the only headers not echoed back.
fn is_body_framing(name: &HeaderName) -> bool {
    *name == hyper::header::CONTENT_LENGTH || *name == hyper::header::TRANSFER_ENCODING
}

pub fn echo_headers(inbound: &HeaderMap, response: &mut HeaderMap) {
    for (name, value) in inbound {
        if is_body_framing(name) {
            continue;
        }
        response.append(name.clone(), value.clone());
    }
}

pub fn append_version(response: &mut HeaderMap, version: &HeaderValue) {
    response.append(VERSION_HEADER, version.clone());
}

/// Build the header set for the outbound call to the next hop.
///
/// `Host` is dropped so the client addresses the next hop itself.
#[must_use]
pub fn normalize_for_forward(inbound: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if HOP_BY_HOP.contains(name) || *name == hyper::header::HOST {
            continue;
        }
        match HeaderName::from_bytes(name.as_str().to_ascii_lowercase().as_bytes()) {
            Ok(lower) => {
                forwarded.append(lower, value.clone());
            }
            Err(e) => {
                tracing::warn!(header = %name, error = %e, "unforwardable header name, skipping");
            }
        }
    }
    forwarded
}
