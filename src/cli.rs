//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, health), and their argument structs. Every `run`
//! flag has an environment variable equivalent for container
//! deployments.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::chain::delay::{DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use crate::chain::{DEFAULT_SERVICE2_URL, DEFAULT_SERVICE3_URL};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("HTTPCHAIN_GIT_SHORT"),
    ", ",
    env!("HTTPCHAIN_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "httpchain",
    version,
    long_version = LONG_VERSION,
    about = "HTTP demo server forwarding across a chain of three services",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        httpchain run                        Listen on :8080\n  \
        httpchain run --addr :9000 --pretty  Local dev mode\n  \
        httpchain health                     Probe a running instance"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Run(Box<RunArgs>),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        httpchain run                                          Listen on :8080\n  \
        VERSION=v1.2 httpchain run --addr 127.0.0.1:8081       Tagged local instance\n  \
        httpchain run --service2-url http://localhost:8082     Local chain")]
pub struct RunArgs {
    /// Listen address (host:port, or :port for every interface)
    #[arg(short, long, env = "ADDR", default_value = ":8080")]
    pub addr: String,

    /// Value of the VERSION response header
    #[arg(long, env = "VERSION", default_value = "")]
    pub version_tag: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Chain --
    /// Base URL of service2, called by /hello/service1
    #[arg(
        long,
        env = "SERVICE2_URL",
        default_value = DEFAULT_SERVICE2_URL,
        help_heading = "Chain"
    )]
    pub service2_url: String,

    /// Base URL of service3, called by /hello/service2
    #[arg(
        long,
        env = "SERVICE3_URL",
        default_value = DEFAULT_SERVICE3_URL,
        help_heading = "Chain"
    )]
    pub service3_url: String,

    // -- Tuning --
    /// Lower bound of the simulated delay in milliseconds (inclusive)
    #[arg(
        long,
        env = "MIN_DELAY_MS",
        default_value_t = DEFAULT_MIN_DELAY_MS,
        help_heading = "Tuning"
    )]
    pub min_delay_ms: u64,

    /// Upper bound of the simulated delay in milliseconds (exclusive)
    #[arg(
        long,
        env = "MAX_DELAY_MS",
        default_value_t = DEFAULT_MAX_DELAY_MS,
        help_heading = "Tuning"
    )]
    pub max_delay_ms: u64,

    /// Timeout for the call to the next hop in milliseconds
    #[arg(
        long,
        env = "REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        help_heading = "Tuning"
    )]
    pub timeout: u64,

    /// Seconds in-flight requests get to finish after a shutdown signal
    #[arg(
        long,
        env = "SHUTDOWN_GRACE_SECS",
        default_value_t = 5,
        help_heading = "Tuning"
    )]
    pub grace_period_secs: u64,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:8080")]
    pub url: String,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}
