//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator the engine consumes (clock, stake token, reputation
//! oracle, poll gateway) has an in-memory stand-in here that:
//! - returns deterministic values,
//! - can be steered programmatically, including injected failures,
//! - never touches the network.

pub mod clock;
pub mod gateway;
pub mod oracle;
pub mod token;

pub use clock::NullClock;
pub use gateway::FlakyGateway;
pub use oracle::NullOracle;
pub use token::{NullToken, FAUCET_AMOUNT};
