//! Outbound call to the next chain hop and wire-form relay of its reply.
//!
//! [`call_next_hop`] issues a single `GET` with the normalized inbound
//! headers and collects the full downstream response. No retries: a
//! failed call is reported once to the caller, which logs it.
//! [`DownstreamResponse::to_wire`] renders the reply as an HTTP/1.1
//! message (status line, headers, blank line, body) so the calling
//! handler can append it verbatim to its own body.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method, StatusCode, Version};
use bytes::{BufMut, Bytes, BytesMut};
use http_body_util::{BodyExt, Full};

use crate::error::ForwardError;
use crate::server::HttpClient;

#[derive(Debug)]
pub struct DownstreamResponse {
    pub version: Version,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DownstreamResponse {
    /// Render as an HTTP/1.1 message.
    ///
    /// The body is already fully collected, so `transfer-encoding` from
    /// the origin no longer applies and `content-length` is rewritten to
    /// the collected size.
    #[must_use]
    pub fn to_wire(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.body.len() + 256);
        out.put_slice(format!("{:?} {}\r\n", self.version, self.status).as_bytes());
        for (name, value) in &self.headers {
            if *name == hyper::header::TRANSFER_ENCODING || *name == hyper::header::CONTENT_LENGTH
            {
                continue;
            }
            out.put_slice(name.as_str().as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("content-length: {}\r\n\r\n", self.body.len()).as_bytes());
        out.put_slice(&self.body);
        out.freeze()
    }
}

#[allow(clippy::cast_possible_truncation)]
pub async fn call_next_hop(
    client: &HttpClient,
    url: &str,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<DownstreamResponse, ForwardError> {
    let uri: hyper::Uri = url.parse().map_err(|source| ForwardError::InvalidUri {
        uri: url.to_string(),
        source,
    })?;

    let mut req_builder = hyper::Request::builder().method(Method::GET).uri(uri);
    for (key, value) in &headers {
        req_builder = req_builder.header(key, value);
    }
    let req = req_builder.body(Full::new(Bytes::new()))?;

    let start = Instant::now();
    let response = tokio::time::timeout(timeout, client.request(req))
        .await
        .map_err(|_| ForwardError::Timeout(timeout))??;

    let version = response.version();
    let status = response.status();
    let resp_headers = response.headers().clone();
    let body = response.into_body().collect().await?.to_bytes();

    tracing::debug!(
        target = %url,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "next hop responded"
    );

    Ok(DownstreamResponse {
        version,
        status,
        headers: resp_headers,
        body,
    })
}
