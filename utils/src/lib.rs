//! Shared utilities for QVote.

pub mod logging;
pub mod retry;
pub mod time;

pub use logging::{init_logging, LogFormat, LoggingError};
pub use retry::{retry_read, RetryPolicy};
pub use time::{format_duration, time_remaining};
