use std::time::Duration;

/// Fixed backoff schedule for failed parse attempts.
///
/// Retry `n` (zero-based) waits `delays[n]`; the number of delays is the
/// number of retries. Delays do not compound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Use the given delays, one per retry.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.delays.len() as u32
    }

    /// Delay before retry `retry` (zero-based), or `None` when exhausted.
    pub fn delay(&self, retry: u32) -> Option<Duration> {
        self.delays.get(retry as usize).copied()
    }

    /// Sum of every delay.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Default for RetryPolicy {
    /// 100, 200, 400 and 800 ms.
    fn default() -> Self {
        Self::new(
            [100, 200, 400, 800]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        )
    }
}
