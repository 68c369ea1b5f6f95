//! One access line per handled request.

use std::fmt;
use std::sync::Arc;

use crate::server::AppState;

/// Log target for access lines; kept at INFO regardless of `--log-level`.
pub const ACCESS_TARGET: &str = "httpchain::access";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Status recorded when the client went away before a response existed.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    timestamp: String,
    client_ip: String,
    status: u16,
}

impl AccessRecord {
    #[must_use]
    pub fn new(client_ip: String, status: u16) -> Self {
        Self {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            client_ip,
            status,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    #[must_use]
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    pub fn emit(&self) {
        tracing::info!(
            target: ACCESS_TARGET,
            timestamp = %self.timestamp,
            client_ip = %self.client_ip,
            status = self.status,
            "{self}"
        );
    }
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time:{}  IP:{}  Status:{}",
            self.timestamp, self.client_ip, self.status
        )
    }
}

/// Counts the status and emits the access line when dropped.
///
/// Created before the handler runs, so a request whose future is
/// dropped mid-flight (client disconnect) is still logged, with
/// [`CLIENT_CLOSED_REQUEST`].
pub struct AccessGuard {
    state: Arc<AppState>,
    client_ip: String,
    status: Option<u16>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(state: Arc<AppState>, client_ip: String) -> Self {
        Self {
            state,
            client_ip,
            status: None,
        }
    }

    pub fn complete(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        let status = self.status.unwrap_or(CLIENT_CLOSED_REQUEST);
        self.state.stats.record_status(status);
        AccessRecord::new(std::mem::take(&mut self.client_ip), status).emit();
    }
}
