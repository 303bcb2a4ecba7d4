//! The poll ledger.
//!
//! One [`PollLedger`] per poll holds the authoritative state: option tallies,
//! the voter registry, the prize pool and claim records. Writes to a poll are
//! serialized by that poll's own lock; polls never contend with each other.
//!
//! Invariants kept by every operation:
//! - Σ option tallies == total weighted votes
//! - at most one vote per identity
//! - Σ payouts ≤ total staked credits, at most one claim per identity

pub mod error;
pub mod event;
pub mod ledger;
pub mod payout;
pub mod poll;
pub mod snapshot;
pub mod vote;

pub use error::LedgerError;
pub use event::LedgerEvent;
pub use ledger::{PollLedger, Results, DEFAULT_EVENT_CAPACITY};
pub use payout::payout_amount;
pub use poll::{PollConfig, PollInfo};
pub use snapshot::LedgerSnapshot;
pub use vote::{ClaimRecord, Vote};
