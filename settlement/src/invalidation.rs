//! Messages telling read-models which cached views are stale.

use qvote_types::{Identity, PollId};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Invalidation {
    /// Per-option tallies and poll totals.
    Tallies { poll: PollId },
    Leaderboard,
    /// A voter's "have I voted" view.
    VoteStatus { poll: PollId, voter: Identity },
    ClaimStatus { poll: PollId, claimant: Identity },
    Balance { owner: Identity },
}

pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, message: Invalidation);
}

/// Collects messages in order. Handy where no read-model is attached.
impl InvalidationSink for Mutex<Vec<Invalidation>> {
    fn invalidate(&self, message: Invalidation) {
        self.lock().unwrap_or_else(PoisonError::into_inner).push(message);
    }
}

/// Discards everything.
impl InvalidationSink for () {
    fn invalidate(&self, _message: Invalidation) {}
}
