//! Vote and claim records. Both are immutable once written.

use qvote_types::{Credits, Identity, Timestamp, Weight};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Identity,
    pub option: usize,
    pub credits: Credits,
    /// The recorded (possibly capped) weight.
    pub weight: Weight,
    /// Weight before the cap was applied.
    pub raw_weight: Weight,
    pub timestamp: Timestamp,
}

impl Vote {
    pub fn was_capped(&self) -> bool {
        self.weight < self.raw_weight
    }

    /// Whether this vote is what a request for (`option`, `credits`) would have produced.
    pub fn matches(&self, option: usize, credits: Credits) -> bool {
        self.option == option && self.credits == credits
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claimant: Identity,
    pub payout: Credits,
    pub claimed_at: Timestamp,
}
