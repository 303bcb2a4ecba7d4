//! Fundamental types for QVote.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identities, poll ids, fixed-point credit/weight/multiplier units, timestamps,
//! poll limits, the error category taxonomy, and the traits for the external
//! collaborators the engine consumes (reputation oracle, stake token, clock).

pub mod amount;
pub mod error;
pub mod identity;
pub mod params;
pub mod reputation;
pub mod time;
pub mod token;

pub use amount::{Credits, Multiplier, Weight, WAD};
pub use error::ErrorCategory;
pub use identity::{Identity, PollId};
pub use params::PollLimits;
pub use reputation::{OracleError, ReputationOracle, ReputationSnapshot, UserStats};
pub use time::{Clock, SystemClock, Timestamp};
pub use token::{StakeToken, TokenError};
