//! Synthetic backend latency.

use std::time::Duration;

use rand::Rng;

use crate::error::HttpChainError;

pub const DEFAULT_MIN_DELAY_MS: u64 = 10;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

/// Draws delays uniformly from `[min_ms, max_ms)`.
///
/// Draws use the thread-local generator, which is seeded once per
/// thread; concurrent requests never share or reseed generator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySimulator {
    min_ms: u64,
    max_ms: u64,
}

impl Default for DelaySimulator {
    fn default() -> Self {
        Self {
            min_ms: DEFAULT_MIN_DELAY_MS,
            max_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl DelaySimulator {
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self, HttpChainError> {
        if min_ms >= max_ms {
            return Err(HttpChainError::InvalidDelayRange { min_ms, max_ms });
        }
        Ok(Self { min_ms, max_ms })
    }

    #[must_use]
    pub fn draw(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..self.max_ms))
    }

    /// Suspend the current request for a freshly drawn delay and return it.
    pub async fn pause(&self) -> Duration {
        let delay = self.draw();
        tokio::time::sleep(delay).await;
        delay
    }
}
