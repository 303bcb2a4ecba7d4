//! Ledger snapshots: capture a poll's full state at a point in time.
//!
//! Read-models and auditors can rebuild their view from a snapshot instead of
//! replaying every event. The snapshot hash is computed deterministically from
//! the poll state so two parties can confirm they saw the same ledger.

use serde::{Deserialize, Serialize};

use crate::ledger::PollLedger;
use crate::poll::PollConfig;
use crate::vote::{ClaimRecord, Vote};
use qvote_types::{Credits, Timestamp, Weight};

/// A poll ledger snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Blake2b-256 of the snapshot contents.
    pub hash: [u8; 32],
    pub config: PollConfig,
    pub taken_at: Timestamp,
    pub tallies: Vec<Weight>,
    pub total_voters: u64,
    pub total_weighted_votes: Weight,
    pub total_bet_amount: Credits,
    /// Votes in commit order.
    pub votes: Vec<Vote>,
    /// Claims sorted by claimant.
    pub claims: Vec<ClaimRecord>,
    pub version: u32,
}

impl LedgerSnapshot {
    pub fn hash_hex(&self) -> String {
        self.hash.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Recompute the hash and compare with the stored one.
    pub fn verify(&self) -> bool {
        self.compute_hash() == self.hash
    }

    fn compute_hash(&self) -> [u8; 32] {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.config.id.as_bytes());
        hasher.update(self.version.to_le_bytes());
        for tally in &self.tallies {
            hasher.update(tally.raw().to_le_bytes());
        }
        hasher.update(self.total_voters.to_le_bytes());
        hasher.update(self.total_weighted_votes.raw().to_le_bytes());
        hasher.update(self.total_bet_amount.raw().to_le_bytes());
        for vote in &self.votes {
            hasher.update(vote.voter.as_str().as_bytes());
            hasher.update((vote.option as u64).to_le_bytes());
            hasher.update(vote.credits.raw().to_le_bytes());
            hasher.update(vote.weight.raw().to_le_bytes());
            hasher.update(vote.raw_weight.raw().to_le_bytes());
            hasher.update(vote.timestamp.as_secs().to_le_bytes());
        }
        for claim in &self.claims {
            hasher.update(claim.claimant.as_str().as_bytes());
            hasher.update(claim.payout.raw().to_le_bytes());
            hasher.update(claim.claimed_at.as_secs().to_le_bytes());
        }
        hasher.finalize().into()
    }
}

impl PollLedger {
    /// Capture the poll's state. Votes and claims are read under their locks
    /// one after the other; a claim cannot precede the votes it pays out on.
    pub fn export_snapshot(&self, now: Timestamp) -> LedgerSnapshot {
        let (tallies, total_voters, total_weighted_votes, total_bet_amount) = {
            let state = self.read_state();
            (
                state.tallies.clone(),
                state.total_voters,
                state.total_weighted,
                state.total_bet,
            )
        };
        let votes = self.votes();
        let mut claims: Vec<ClaimRecord> = self.claim_book().records.values().cloned().collect();
        claims.sort_by(|a, b| a.claimant.cmp(&b.claimant));

        let mut snap = LedgerSnapshot {
            hash: [0u8; 32],
            config: self.config().clone(),
            taken_at: now,
            tallies,
            total_voters,
            total_weighted_votes,
            total_bet_amount,
            votes,
            claims,
            version: 1,
        };
        snap.hash = snap.compute_hash();
        snap
    }
}
