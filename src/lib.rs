//! httpchain is a small HTTP server demonstrating request forwarding
//! across a fixed chain of three services.
//!
//! `/hello/service1` greets and relays the reply of service2, which in
//! turn relays service3; service3 ends the chain by listing the headers
//! it received. Every response echoes the inbound headers and carries a
//! `VERSION` header, and every request produces one access line.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, health).
//! - [`chain`] -- Chain positions, greeting handlers, client IP
//!   resolution, header transformation, delay simulation, and the
//!   outbound call to the next hop.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /healthz` liveness handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`metrics`] -- Status counters and latency histogram at `GET /metrics`.
//! - [`middleware`] -- Header echo, `VERSION` injection and access logging.
//! - [`server`] -- Axum router, shared application state, HTTP client, and
//!   bounded graceful shutdown.

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod chain;
pub mod cli;
pub mod cmd;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod server;
