//! The seam between settlement flows and wherever the ledger lives.
//!
//! Writes return a [`TxTicket`] immediately; their effect is observed later
//! through [`PollGateway::tx_status`]. A gateway may execute in-process or
//! forward to a remote ledger, the flows cannot tell the difference.

use crate::error::GatewayError;
use qvote_ledger::{ClaimRecord, LedgerEvent, PollInfo, Vote};
use qvote_types::{Credits, Identity, PollId, Timestamp, Weight};
use qvote_weight::TallySnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Handle to a submitted write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxTicket(u64);

impl TxTicket {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Approval,
    Vote,
    Claim,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    /// Executed and refused; nothing was written.
    Reverted(GatewayError),
}

impl TxStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

pub trait PollGateway: Send + Sync {
    /// The gateway's clock. Activity checks use this, not the caller's.
    fn now(&self) -> Timestamp;

    fn poll_info(&self, poll: &PollId) -> Result<PollInfo, GatewayError>;

    /// Totals a vote submitted now would be weighted against.
    fn poll_snapshot(&self, poll: &PollId) -> Result<TallySnapshot, GatewayError>;

    fn results(&self, poll: &PollId) -> Result<Vec<Weight>, GatewayError>;

    fn winner(&self, poll: &PollId) -> Result<(usize, Weight), GatewayError>;

    fn vote_of(&self, poll: &PollId, voter: &Identity) -> Result<Option<Vote>, GatewayError>;

    /// Allowance `owner` has granted the poll's escrow.
    fn allowance(&self, owner: &Identity, poll: &PollId) -> Result<Credits, GatewayError>;

    fn balance(&self, owner: &Identity) -> Result<Credits, GatewayError>;

    fn claim_record(
        &self,
        poll: &PollId,
        claimant: &Identity,
    ) -> Result<Option<ClaimRecord>, GatewayError>;

    fn has_claimed(&self, poll: &PollId, claimant: &Identity) -> Result<bool, GatewayError> {
        Ok(self.claim_record(poll, claimant)?.is_some())
    }

    /// Set the allowance `owner` grants the poll's escrow to `amount`.
    fn submit_approval(
        &self,
        owner: &Identity,
        poll: &PollId,
        amount: Credits,
    ) -> Result<TxTicket, GatewayError>;

    fn submit_vote(
        &self,
        voter: &Identity,
        poll: &PollId,
        option: usize,
        credits: Credits,
    ) -> Result<TxTicket, GatewayError>;

    fn submit_claim(&self, claimant: &Identity, poll: &PollId) -> Result<TxTicket, GatewayError>;

    fn tx_status(&self, ticket: TxTicket) -> Result<TxStatus, GatewayError>;

    /// Push notifications for `poll`, when the gateway can offer them.
    fn subscribe(&self, _poll: &PollId) -> Option<broadcast::Receiver<LedgerEvent>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_display() {
        assert_eq!(TxTicket::new(42).to_string(), "tx#42");
        assert_eq!(TxTicket::new(42).seq(), 42);
    }

    #[test]
    fn pending_is_not_final() {
        assert!(!TxStatus::Pending.is_final());
        assert!(TxStatus::Confirmed.is_final());
        assert!(TxStatus::Reverted(GatewayError::Unavailable("x".into())).is_final());
    }
}
