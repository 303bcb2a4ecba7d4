//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use qvote_settlement::FlowSettings;
use qvote_types::PollLimits;
use qvote_utils::{LogFormat, RetryPolicy};

use crate::EngineError;

/// Configuration for a QVote engine.
///
/// Loaded from a TOML file via [`EngineConfig::from_toml_file`] or built
/// programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on waiting for one submitted write to confirm.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,

    /// How often a pending write's status is polled.
    #[serde(default = "default_confirmation_interval_ms")]
    pub confirmation_interval_ms: u64,

    /// Poll watcher re-read interval when no push channel is available.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Attempts per read, including the first.
    #[serde(default = "default_read_retry_attempts")]
    pub read_retry_attempts: u32,

    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_read_retry_base_ms")]
    pub read_retry_base_ms: u64,

    /// Capacity of each poll's event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "default_max_credits_per_vote")]
    pub max_credits_per_vote: u64,

    /// How many recently created polls the registry indexes.
    #[serde(default = "default_recent_index_capacity")]
    pub recent_index_capacity: usize,

    /// Concurrent ledger writes across all polls.
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Filter directive, e.g. "info" or "debug,qvote_ledger=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_confirmation_timeout_ms() -> u64 {
    30_000
}

fn default_confirmation_interval_ms() -> u64 {
    250
}

fn default_refresh_interval_ms() -> u64 {
    5_000
}

fn default_read_retry_attempts() -> u32 {
    3
}

fn default_read_retry_base_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    qvote_ledger::DEFAULT_EVENT_CAPACITY
}

fn default_max_credits_per_vote() -> u64 {
    u64::try_from(PollLimits::default().max_credits_per_vote).unwrap_or(u64::MAX)
}

fn default_recent_index_capacity() -> usize {
    PollLimits::default().recent_index_capacity
}

fn default_max_concurrent_writes() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_credits_per_vote == 0 {
            return Err(EngineError::Config("max_credits_per_vote must be positive".into()));
        }
        if self.confirmation_timeout_ms == 0 {
            return Err(EngineError::Config("confirmation_timeout_ms must be positive".into()));
        }
        if self.max_concurrent_writes == 0 {
            return Err(EngineError::Config("max_concurrent_writes must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_limits(&self) -> PollLimits {
        PollLimits {
            max_credits_per_vote: u128::from(self.max_credits_per_vote),
            recent_index_capacity: self.recent_index_capacity,
            ..PollLimits::default()
        }
    }

    pub fn read_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.read_retry_attempts,
            Duration::from_millis(self.read_retry_base_ms),
        )
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            confirmation_timeout: Duration::from_millis(self.confirmation_timeout_ms),
            confirmation_interval: Duration::from_millis(self.confirmation_interval_ms),
            read_retry: self.read_retry(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            confirmation_interval_ms: default_confirmation_interval_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            read_retry_attempts: default_read_retry_attempts(),
            read_retry_base_ms: default_read_retry_base_ms(),
            event_capacity: default_event_capacity(),
            max_credits_per_vote: default_max_credits_per_vote(),
            recent_index_capacity: default_recent_index_capacity(),
            max_concurrent_writes: default_max_concurrent_writes(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = EngineConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.confirmation_timeout_ms, 30_000);
        assert_eq!(config.max_credits_per_vote, 100);
        assert_eq!(config.recent_index_capacity, 50);
        assert_eq!(config.log_format, LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            max_credits_per_vote = 1000
            log_format = "json"
            refresh_interval_ms = 500
        "#;
        let config = EngineConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.max_credits_per_vote, 1_000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.refresh_interval(), Duration::from_millis(500));
        assert_eq!(config.poll_limits().max_credits_per_vote, 1_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn zero_credit_limit_is_rejected() {
        let result = EngineConfig::from_toml_str("max_credits_per_vote = 0");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confirmation_timeout_ms = 1500").unwrap();
        let config = EngineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(
            config.flow_settings().confirmation_timeout,
            Duration::from_millis(1_500)
        );
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = EngineConfig::from_toml_file("/nonexistent/qvote.toml");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
