use std::time::Duration;

/// Default per-operation timeout, five minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Settings for a [`TlsStream`](crate::TlsStream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl StreamConfig {
    /// Timeout in milliseconds. Negative means wait without limit, zero
    /// means never block.
    pub fn from_millis(ms: i64) -> Self {
        let timeout = u64::try_from(ms).ok().map(Duration::from_millis);
        Self { timeout }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long a single transport read or write may block.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
