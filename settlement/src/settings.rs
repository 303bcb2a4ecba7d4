use qvote_utils::RetryPolicy;
use std::time::Duration;

/// Timing knobs shared by vote and claim flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowSettings {
    /// Upper bound on waiting for one write to confirm.
    pub confirmation_timeout: Duration,
    /// How often `tx_status` is polled while waiting.
    pub confirmation_interval: Duration,
    /// Applied to reads only.
    pub read_retry: RetryPolicy,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(30),
            confirmation_interval: Duration::from_millis(250),
            read_retry: RetryPolicy::default(),
        }
    }
}
