//! Session configuration

use std::time::Duration;

/// Session manager configuration options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Samples per journey before it is checkpointed (0 = unbounded)
    pub max_journey_samples: usize,

    /// Save attempts per journey (1 = no retry)
    pub save_attempts: u32,

    /// Delay between save attempts
    pub retry_backoff: Duration,

    /// How long shutdown waits for pending journey saves
    pub shutdown_flush_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_journey_samples: 0,
            save_attempts: 1,
            retry_backoff: Duration::from_millis(250),
            shutdown_flush_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Set the checkpoint threshold
    pub fn max_journey_samples(mut self, max: usize) -> Self {
        self.max_journey_samples = max;
        self
    }

    /// Set save attempts and the delay between them
    pub fn save_attempts(mut self, attempts: u32, backoff: Duration) -> Self {
        self.save_attempts = attempts.max(1);
        self.retry_backoff = backoff;
        self
    }

    /// Set the shutdown flush timeout
    pub fn shutdown_flush_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_flush_timeout = timeout;
        self
    }
}
