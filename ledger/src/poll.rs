//! Poll configuration (fixed at creation) and the read-only poll view.

use qvote_types::{Credits, Identity, PollId, Timestamp, Weight};
use serde::{Deserialize, Serialize};

/// Immutable poll parameters, validated by the registry before the ledger exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub creator: Identity,
    pub created_at: Timestamp,
    pub end_time: Timestamp,
    /// Cap on any single vote, as a multiple of the running average weight.
    pub max_weight_cap: u32,
    pub max_credits_per_vote: u128,
}

impl PollConfig {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    /// Active ⇔ `now < end_time`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.end_time
    }

    /// The escrow account holding this poll's stakes.
    pub fn escrow(&self) -> Identity {
        Identity::escrow(&self.id)
    }
}

/// Everything a caller needs to render a poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollInfo {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub creator: Identity,
    pub created_at: Timestamp,
    pub end_time: Timestamp,
    pub is_active: bool,
    pub max_weight_cap: u32,
    pub max_credits_per_vote: u128,
    pub total_voters: u64,
    pub total_weighted_votes: Weight,
    pub total_bet_amount: Credits,
}
