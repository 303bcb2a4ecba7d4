//! Winner settlement and proportional payout claims.
//!
//! `payout = totalBetAmount × voterWeight / winningTally`, floored. Flooring
//! every share guarantees the sum of payouts never exceeds the pool; the dust
//! stays in escrow with any unclaimed shares.

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::ledger::PollLedger;
use crate::vote::ClaimRecord;
use qvote_types::{Credits, Identity, Timestamp, TokenError, Weight};
use qvote_weight::mul_div_floor;

/// A voter's share of `pool` given their weight on the winning option.
pub fn payout_amount(
    pool: Credits,
    voter_weight: Weight,
    winning_tally: Weight,
) -> Result<Credits, LedgerError> {
    if winning_tally.is_zero() {
        return Err(LedgerError::NothingToClaim);
    }
    mul_div_floor(pool.raw(), voter_weight.raw(), winning_tally.raw())
        .map(Credits::new)
        .ok_or(LedgerError::Overflow)
}

impl PollLedger {
    /// What `claimant` would receive, without marking anything.
    pub fn payout_for(&self, claimant: &Identity, now: Timestamp) -> Result<Credits, LedgerError> {
        if self.is_active(now) {
            return Err(LedgerError::PollStillActive);
        }
        let state = self.read_state();
        let (winning_option, winning_tally) = state.winner();
        let vote = state
            .votes
            .get(claimant)
            .filter(|v| v.option == winning_option)
            .ok_or(LedgerError::NothingToClaim)?;
        payout_amount(state.total_bet, vote.weight, winning_tally)
    }

    /// Claim without moving tokens.
    pub fn claim(&self, claimant: &Identity, now: Timestamp) -> Result<ClaimRecord, LedgerError> {
        self.claim_with(claimant, now, |_| Ok(()))
    }

    /// Claim, calling `pay` with the payout before the claim is marked.
    ///
    /// The already-claimed check, `pay`, and the mark all happen under the
    /// claim lock, so concurrent attempts by one identity pay out once. Other
    /// identities only contend on that lock, never on the vote-write path.
    pub fn claim_with<F>(
        &self,
        claimant: &Identity,
        now: Timestamp,
        pay: F,
    ) -> Result<ClaimRecord, LedgerError>
    where
        F: FnOnce(Credits) -> Result<(), TokenError>,
    {
        let payout = self.payout_for(claimant, now)?;
        let pool = self.total_bet_amount();

        let mut book = self.claim_book();
        if book.records.contains_key(claimant) {
            return Err(LedgerError::AlreadyClaimed(claimant.clone()));
        }
        let paid = book.paid.checked_add(payout).ok_or(LedgerError::Overflow)?;
        if paid > pool {
            return Err(LedgerError::PoolExhausted {
                requested: payout.raw(),
                remaining: pool.saturating_sub(book.paid).raw(),
            });
        }

        pay(payout)?;

        let record = ClaimRecord {
            claimant: claimant.clone(),
            payout,
            claimed_at: now,
        };
        book.records.insert(claimant.clone(), record.clone());
        book.paid = paid;
        drop(book);

        tracing::info!(
            poll = %self.id().short(),
            %claimant,
            payout = payout.raw(),
            "payout claimed"
        );
        self.emit(LedgerEvent::Claimed {
            poll: *self.id(),
            claimant: claimant.clone(),
            payout,
            at: now,
        });

        Ok(record)
    }

    pub fn has_claimed(&self, claimant: &Identity) -> bool {
        self.claim_book().records.contains_key(claimant)
    }

    pub fn claim_record(&self, claimant: &Identity) -> Option<ClaimRecord> {
        self.claim_book().records.get(claimant).cloned()
    }

    /// Sum of all payouts made so far.
    pub fn claimed_amount(&self) -> Credits {
        self.claim_book().paid
    }

    /// Credits still held in escrow. Unclaimed shares stay locked here.
    pub fn unclaimed_amount(&self) -> Credits {
        self.total_bet_amount().saturating_sub(self.claimed_amount())
    }
}
