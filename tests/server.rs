//! Integration tests for routing, the service chain, header echo, metrics,
//! and bounded graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use httpchain::chain::delay::DelaySimulator;
use httpchain::chain::ChainTargets;
use httpchain::cli::HealthArgs;
use httpchain::cmd;
use httpchain::error::HttpChainError;
use httpchain::server::{self, AppState};
use reqwest::header::HeaderMap;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<Result<(), HttpChainError>>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn stop(self) -> Result<(), HttpChainError> {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap()
    }
}

fn fast_delay() -> DelaySimulator {
    DelaySimulator::new(1, 2).unwrap()
}

fn test_state(version: &'static str, chain: ChainTargets, delay: DelaySimulator) -> AppState {
    AppState::new(
        HeaderValue::from_static(version),
        chain,
        delay,
        Duration::from_secs(5),
    )
}

async fn start_server(state: AppState, grace: Duration) -> TestServer {
    let router = server::build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server::serve(
        listener,
        router,
        async {
            let _ = shutdown_rx.await;
        },
        grace,
    ));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

async fn start_default() -> TestServer {
    start_server(
        test_state("test-version", ChainTargets::default(), fast_delay()),
        Duration::from_secs(5),
    )
    .await
}

#[tokio::test]
async fn healthz_returns_fixed_body() {
    let server = start_default().await;

    for _ in 0..3 {
        let resp = reqwest::get(server.url("/healthz")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get("version").unwrap(), "test-version");
        assert_eq!(resp.text().await.unwrap(), "Status OK!");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn unmatched_route_returns_empty_404() {
    let server = start_default().await;

    for path in ["/nope", "/hello/service4", "/hello/service1/", "/hello"] {
        let resp = reqwest::get(server.url(path)).await.unwrap();
        assert_eq!(resp.status(), 404, "path {path}");
        assert_eq!(resp.headers().get("version").unwrap(), "test-version");
        assert!(resp.text().await.unwrap().is_empty(), "path {path}");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn inbound_headers_are_echoed_on_every_route() {
    let server = start_default().await;

    let mut headers = HeaderMap::new();
    headers.append("x-trace", "a".parse().unwrap());
    headers.append("x-trace", "b".parse().unwrap());
    headers.insert("x-real-ip", "9.9.9.9".parse().unwrap());

    let client = reqwest::Client::new();
    for path in ["/healthz", "/hello/golang", "/nope"] {
        let resp = client
            .get(server.url(path))
            .headers(headers.clone())
            .send()
            .await
            .unwrap();
        let echoed: Vec<_> = resp.headers().get_all("x-trace").iter().collect();
        assert_eq!(echoed, ["a", "b"], "path {path}");
        assert_eq!(resp.headers().get("x-real-ip").unwrap(), "9.9.9.9");
        assert!(resp.headers().get("version").is_some());
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn connection_scoped_headers_are_echoed_too() {
    let server = start_default().await;

    let resp = reqwest::Client::new()
        .get(server.url("/healthz"))
        .header("keep-alive", "timeout=5")
        .header("te", "trailers")
        .header("proxy-authorization", "Basic eA==")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("keep-alive").unwrap(), "timeout=5");
    assert_eq!(resp.headers().get("te").unwrap(), "trailers");
    assert_eq!(
        resp.headers().get("proxy-authorization").unwrap(),
        "Basic eA=="
    );
    assert_eq!(resp.text().await.unwrap(), "Status OK!");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn empty_version_header_is_still_sent() {
    let server = start_server(
        test_state("", ChainTargets::default(), fast_delay()),
        Duration::from_secs(5),
    )
    .await;

    let resp = reqwest::get(server.url("/healthz")).await.unwrap();
    assert_eq!(resp.headers().get("version").unwrap(), "");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn hello_golang_waits_within_delay_bounds() {
    let server = start_server(
        test_state("v", ChainTargets::default(), DelaySimulator::default()),
        Duration::from_secs(5),
    )
    .await;

    let start = Instant::now();
    let resp = reqwest::get(server.url("/hello/golang")).await.unwrap();
    let status = resp.status();
    let body = resp.text().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status, 200);
    assert_eq!(body, "Hello, Golang!");
    assert!(elapsed >= Duration::from_millis(10), "took {elapsed:?}");
    // 2000ms upper bound plus local round-trip slack
    assert!(elapsed < Duration::from_millis(2500), "took {elapsed:?}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn service3_lists_received_headers() {
    let server = start_default().await;

    let resp = reqwest::Client::new()
        .get(server.url("/hello/service3"))
        .header("x-trace", "abc")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();

    let mut lines = body.lines();
    assert_eq!(lines.next(), Some("Hello, Service3!"));
    let listed: Vec<&str> = lines.collect();
    assert!(listed.contains(&"x-trace: abc"), "body: {body}");
    assert!(listed.contains(&"accept: */*"), "body: {body}");
    assert!(!listed.iter().any(|l| l.starts_with("host:")), "body: {body}");
    assert!(listed.iter().all(|l| l.contains(": ")));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn chain_relays_through_all_three_services() {
    let service3 = start_server(
        test_state("svc3", ChainTargets::default(), fast_delay()),
        Duration::from_secs(5),
    )
    .await;
    let service2 = start_server(
        test_state(
            "svc2",
            ChainTargets {
                service3: format!("http://{}", service3.addr),
                ..ChainTargets::default()
            },
            fast_delay(),
        ),
        Duration::from_secs(5),
    )
    .await;
    let service1 = start_server(
        test_state(
            "svc1",
            ChainTargets {
                service2: format!("http://{}", service2.addr),
                ..ChainTargets::default()
            },
            fast_delay(),
        ),
        Duration::from_secs(5),
    )
    .await;

    let resp = reqwest::Client::new()
        .get(service1.url("/hello/service1"))
        .header("X-Trace", "abc")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("version").unwrap(), "svc1");
    let body = resp.text().await.unwrap();

    assert!(
        body.starts_with("Hello, Service1!\nHTTP/1.1 200 OK\r\n"),
        "body: {body}"
    );
    assert!(body.contains("version: svc2\r\n"));
    assert!(body.contains("\r\n\r\nHello, Service2!\nHTTP/1.1 200 OK\r\n"));
    assert!(body.contains("version: svc3\r\n"));
    assert!(body.contains("\r\n\r\nHello, Service3!\n"));
    // Forwarded lower-cased, and the hop's own Host replaces the caller's
    assert!(body.contains("x-trace: abc\n"));
    assert!(body.contains(&format!("host: {}\r\n", service2.addr)));
    assert!(!body.contains(&format!("host: {}", service1.addr)));

    service1.stop().await.unwrap();
    service2.stop().await.unwrap();
    service3.stop().await.unwrap();
}

#[tokio::test]
async fn downstream_failure_still_answers_ok() {
    // Reserve a port, then free it so the next hop refuses connections
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let server = start_server(
        test_state(
            "v",
            ChainTargets {
                service2: format!("http://{dead_addr}"),
                ..ChainTargets::default()
            },
            fast_delay(),
        ),
        Duration::from_secs(5),
    )
    .await;

    let resp = reqwest::get(server.url("/hello/service1")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello, Service1!\n");

    let metrics = reqwest::get(server.url("/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("httpserver_downstream_failures_total 1\n"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn metrics_count_statuses_and_latency() {
    let server = start_default().await;

    reqwest::get(server.url("/healthz")).await.unwrap();
    reqwest::get(server.url("/hello/golang")).await.unwrap();
    reqwest::get(server.url("/nope")).await.unwrap();

    let resp = reqwest::get(server.url("/metrics")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let body = resp.text().await.unwrap();
    assert!(body.contains("httpserver_requests_total{code=\"200\"} 2\n"), "{body}");
    assert!(body.contains("httpserver_requests_total{code=\"404\"} 1\n"));
    assert!(body.contains("httpserver_execution_latency_seconds_count 1\n"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn metrics_answer_any_method() {
    let server = start_default().await;

    let resp = reqwest::Client::new()
        .post(server.url("/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .text()
        .await
        .unwrap()
        .contains("# TYPE httpserver_uptime_seconds gauge\n"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn client_disconnect_still_produces_an_access_record() {
    let server = start_server(
        test_state("v", ChainTargets::default(), DelaySimulator::new(500, 501).unwrap()),
        Duration::from_secs(5),
    )
    .await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    assert!(impatient.get(server.url("/hello/golang")).send().await.is_err());
    // Outlast the delay the abandoned request would have waited
    tokio::time::sleep(Duration::from_millis(900)).await;

    let metrics = reqwest::get(server.url("/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(
        metrics.contains("httpserver_requests_total{code=\"499\"} 1\n"),
        "{metrics}"
    );
    assert!(!metrics.contains("code=\"200\""), "{metrics}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn health_command_reports_status() {
    let server = start_default().await;

    cmd::health::execute(HealthArgs {
        url: format!("http://{}/", server.addr),
    })
    .await
    .unwrap();

    // `<url>/healthz` under an unknown prefix answers 404
    let err = cmd::health::execute(HealthArgs {
        url: server.url("/nope"),
    })
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        HttpChainError::HealthCheckFailed(status) if status == 404
    ));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn graceful_shutdown_lets_in_flight_requests_finish() {
    let server = start_server(
        test_state("v", ChainTargets::default(), DelaySimulator::new(300, 301).unwrap()),
        Duration::from_secs(5),
    )
    .await;

    let url = server.url("/hello/golang");
    let in_flight = tokio::spawn(async move { reqwest::get(url).await?.text().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let addr = server.addr;
    server.stop().await.unwrap();

    assert_eq!(in_flight.await.unwrap().unwrap(), "Hello, Golang!");
    // Server should no longer accept connections
    assert!(reqwest::get(format!("http://{addr}/healthz")).await.is_err());
}

#[tokio::test]
async fn shutdown_reports_requests_outliving_the_grace_period() {
    let server = start_server(
        test_state("v", ChainTargets::default(), DelaySimulator::new(3000, 3001).unwrap()),
        Duration::from_millis(200),
    )
    .await;

    let url = server.url("/hello/golang");
    let in_flight = tokio::spawn(async move { reqwest::get(url).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Process exit tears down the abandoned connection; here we only
    // check that the overrun is reported.
    let result = server.stop().await;
    assert!(matches!(
        result,
        Err(HttpChainError::ShutdownTimeout { grace }) if grace == Duration::from_millis(200)
    ));
    in_flight.abort();
}
