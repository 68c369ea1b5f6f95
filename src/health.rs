//! `GET /healthz` liveness probe.
//!
//! Answers immediately with a fixed body: no delay, no forwarding, no
//! state read.

pub const HEALTHY_BODY: &str = "Status OK!";

pub async fn health_handler() -> &'static str {
    HEALTHY_BODY
}
