//! Request counters and the execution-latency histogram.
//!
//! [`Stats`] lives in the shared [`AppState`](crate::server::AppState)
//! and is updated with relaxed atomics on the request path.
//! [`metrics_handler`] renders it in the Prometheus text format at
//! `GET /metrics`.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use crate::server::AppState;

const NAMESPACE: &str = "httpserver";
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Upper bounds in seconds: 1ms doubling up to ~16s.
const BUCKET_COUNT: usize = 15;
const BUCKET_START_SECS: f64 = 0.001;

#[derive(Debug)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; BUCKET_COUNT],
    overflow: AtomicU64,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buckets: [const { AtomicU64::new(0) }; BUCKET_COUNT],
            overflow: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    fn upper_bound(idx: usize) -> f64 {
        BUCKET_START_SECS * f64::from(1u32 << idx)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn observe(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        match (0..BUCKET_COUNT).find(|&i| secs <= Self::upper_bound(i)) {
            Some(idx) => self.buckets[idx].fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
        self.sum_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[allow(clippy::cast_precision_loss)]
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {name} Time spent handling greeting requests.");
        let _ = writeln!(out, "# TYPE {name} histogram");
        let mut cumulative = 0;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "{name}_bucket{{le=\"{}\"}} {cumulative}",
                Self::upper_bound(idx)
            );
        }
        cumulative += self.overflow.load(Ordering::Relaxed);
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");
        let sum_secs = self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{name}_sum {sum_secs}");
        let _ = writeln!(out, "{name}_count {}", self.count());
    }
}

#[derive(Debug)]
pub struct Stats {
    started: Instant,
    responses: Mutex<BTreeMap<u16, u64>>,
    pub downstream_failures: AtomicU64,
    pub latency: LatencyHistogram,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            responses: Mutex::new(BTreeMap::new()),
            downstream_failures: AtomicU64::new(0),
            latency: LatencyHistogram::new(),
        }
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_status(&self, status: u16) {
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *responses.entry(status).or_insert(0) += 1;
    }

    #[must_use]
    pub fn responses_with_status(&self, status: u16) -> u64 {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&status)
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn render(&self) -> String {
        let responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut out = String::new();
        let name = format!("{NAMESPACE}_requests_total");
        let _ = writeln!(out, "# HELP {name} Handled requests by response status.");
        let _ = writeln!(out, "# TYPE {name} counter");
        for (code, count) in &responses {
            let _ = writeln!(out, "{name}{{code=\"{code}\"}} {count}");
        }

        let name = format!("{NAMESPACE}_downstream_failures_total");
        let _ = writeln!(out, "# HELP {name} Failed calls to the next chain hop.");
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(
            out,
            "{name} {}",
            self.downstream_failures.load(Ordering::Relaxed)
        );

        let name = format!("{NAMESPACE}_uptime_seconds");
        let _ = writeln!(out, "# HELP {name} Seconds since the server started.");
        let _ = writeln!(out, "# TYPE {name} gauge");
        let _ = writeln!(out, "{name} {}", self.uptime().as_secs_f64());

        self.latency
            .render(&format!("{NAMESPACE}_execution_latency_seconds"), &mut out);
        out
    }
}

/// Observes the time from `start` until drop into the latency histogram.
pub struct ExecutionTimer<'a> {
    stats: &'a Stats,
    started: Instant,
}

impl<'a> ExecutionTimer<'a> {
    #[must_use]
    pub fn start(stats: &'a Stats) -> Self {
        Self {
            stats,
            started: Instant::now(),
        }
    }
}

impl Drop for ExecutionTimer<'_> {
    fn drop(&mut self) {
        self.stats.latency.observe(self.started.elapsed());
    }
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.stats.render())
}
