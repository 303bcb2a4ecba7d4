//! The QVote engine service.
//!
//! Ties the registry, the settlement flows and the external collaborators
//! together behind [`VoteEngine`]:
//! - [`LocalGateway`]: in-process gateway with ticketed, per-poll serialized writes
//! - [`SubmissionHandle`]: background commands resolving to a [`FlowOutcome`]
//! - [`ReadModels`]: cached views kept fresh by invalidation messages
//! - [`PollWatcher`]: push-or-poll notification streams
//! - [`EngineMetrics`] and [`EngineConfig`]
//!
//! [`FlowOutcome`]: qvote_settlement::FlowOutcome

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod local;
pub mod metrics;
pub mod poll_writer;
pub mod read_model;
pub mod watcher;

pub use config::EngineConfig;
pub use engine::VoteEngine;
pub use error::EngineError;
pub use handle::SubmissionHandle;
pub use local::LocalGateway;
pub use metrics::EngineMetrics;
pub use poll_writer::PollWriter;
pub use read_model::{LeaderboardEntry, ReadModels};
pub use watcher::{PollNotification, PollView, PollWatcher};
