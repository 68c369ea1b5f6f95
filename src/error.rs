//! Unified error types for httpchain.
//!
//! [`HttpChainError`] covers process-level failures (startup, the
//! `health` subcommand, shutdown). [`ForwardError`] covers a single
//! outbound call to the next chain hop; it never leaves the request
//! that produced it.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HttpChainError {
    #[error("Invalid delay range: min {min_ms}ms must be below max {max_ms}ms")]
    InvalidDelayRange { min_ms: u64, max_ms: u64 },

    #[error("Invalid VERSION value {value:?}: not a valid header value")]
    InvalidVersion { value: String },

    #[error("Invalid next-hop URL for {service}: {source}")]
    InvalidUpstream {
        service: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    ServerTask(#[from] tokio::task::JoinError),

    #[error("Server shutdown failed: in-flight requests still running after {}s", grace.as_secs_f64())]
    ShutdownTimeout { grace: Duration },

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid next-hop URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: hyper::http::uri::InvalidUri,
    },

    #[error("failed to build request: {0}")]
    Build(#[from] hyper::http::Error),

    #[error("request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("body read error: {0}")]
    Body(#[from] hyper::Error),
}
