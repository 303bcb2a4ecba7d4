//! Notifications emitted by the ledger for downstream read-models.

use qvote_types::{Credits, Identity, PollId, Timestamp, Weight};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A vote was committed.
    VoteRecorded {
        poll: PollId,
        voter: Identity,
        option: usize,
        credits: Credits,
        weight: Weight,
        /// Poll totals after this vote.
        total_voters: u64,
        total_weighted: Weight,
        at: Timestamp,
    },
    /// A payout claim was committed.
    Claimed {
        poll: PollId,
        claimant: Identity,
        payout: Credits,
        at: Timestamp,
    },
}

impl LedgerEvent {
    pub fn poll(&self) -> &PollId {
        match self {
            Self::VoteRecorded { poll, .. } | Self::Claimed { poll, .. } => poll,
        }
    }
}
