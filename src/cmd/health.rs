//! `httpchain health` — check the health of a running instance.
//!
//! Sends a `GET /healthz` request to the specified URL and reports
//! whether the instance answered `200 Status OK!`.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::HttpChainError;
use crate::health::HEALTHY_BODY;

pub async fn execute(args: HealthArgs) -> Result<(), HttpChainError> {
    let url = format!("{}/healthz", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| HttpChainError::UriParse {
                source: Box::new(e),
            },
        )?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| HttpChainError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| HttpChainError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| HttpChainError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let version = response
        .headers()
        .get("version")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| HttpChainError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(HttpChainError::HealthCheckFailed(status));
    }

    let body_str = String::from_utf8_lossy(&body);
    if body_str == HEALTHY_BODY {
        println!("\u{2713} httpchain is healthy ({})", args.url);
    } else {
        println!("? httpchain answered {status} with an unexpected body ({})", args.url);
        println!("  body:    {body_str}");
    }
    if !version.is_empty() {
        println!("  version: {version}");
    }

    Ok(())
}
