//! The claim flow: pre-check, submit, confirm, settle.

use crate::confirm::{await_confirmation, read, PendingWrite};
use crate::error::{GatewayError, SettlementError};
use crate::gateway::{PollGateway, TxStatus, TxTicket};
use crate::invalidation::{Invalidation, InvalidationSink};
use crate::outcome::is_rejection;
use crate::settings::FlowSettings;
use crate::state::{ClaimFlowState, Transition};
use qvote_ledger::{ClaimRecord, LedgerError};
use qvote_types::{ErrorCategory, Identity, PollId};

#[derive(Debug)]
pub struct ClaimFlow {
    poll: PollId,
    claimant: Identity,
    state: ClaimFlowState,
    history: Vec<Transition<ClaimFlowState>>,
    pending: Option<PendingWrite>,
    claims_submitted: u32,
    record: Option<ClaimRecord>,
}

impl ClaimFlow {
    pub fn new(poll: PollId, claimant: Identity) -> Self {
        Self {
            poll,
            claimant,
            state: ClaimFlowState::Idle,
            history: Vec::new(),
            pending: None,
            claims_submitted: 0,
            record: None,
        }
    }

    pub fn poll(&self) -> &PollId {
        &self.poll
    }

    pub fn claimant(&self) -> &Identity {
        &self.claimant
    }

    pub fn state(&self) -> ClaimFlowState {
        self.state
    }

    pub fn history(&self) -> &[Transition<ClaimFlowState>] {
        &self.history
    }

    pub fn is_ambiguous(&self) -> bool {
        self.pending.is_some()
    }

    pub fn claims_submitted(&self) -> u32 {
        self.claims_submitted
    }

    pub fn record(&self) -> Option<&ClaimRecord> {
        self.record.as_ref()
    }

    /// Drive the claim to `Settled`, `Rejected`, or `Failed`. A `Failed` flow
    /// may be run again and checks `has_claimed` before resubmitting.
    pub async fn run<G>(
        &mut self,
        gateway: &G,
        sink: &dyn InvalidationSink,
        settings: &FlowSettings,
    ) -> Result<ClaimRecord, SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        if let (ClaimFlowState::Settled, Some(record)) = (self.state, &self.record) {
            return Ok(record.clone());
        }
        match self.state {
            ClaimFlowState::Idle => {}
            ClaimFlowState::Failed => self.transition(ClaimFlowState::Idle)?,
            state => {
                return Err(SettlementError::IllegalTransition {
                    from: state.to_string(),
                    to: ClaimFlowState::ClaimPending.to_string(),
                })
            }
        }

        match self.drive(gateway, sink, settings).await {
            Ok(record) => Ok(record),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn drive<G>(
        &mut self,
        gateway: &G,
        sink: &dyn InvalidationSink,
        settings: &FlowSettings,
    ) -> Result<ClaimRecord, SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        let (poll, claimant) = (self.poll, self.claimant.clone());
        let retry = settings.read_retry;

        let info = read(retry, || gateway.poll_info(&poll)).await?;

        if let Some(record) = read(retry, || gateway.claim_record(&poll, &claimant)).await? {
            if self.pending.is_none() {
                return Err(LedgerError::AlreadyClaimed(claimant).into());
            }
            tracing::info!(poll = %poll.short(), %claimant, "earlier claim found on retry, not resubmitting");
            self.pending = None;
            self.transition(ClaimFlowState::ClaimConfirmed)?;
            return Ok(self.settle(record, sink));
        }

        if let Some(PendingWrite::Claim(Some(ticket))) = self.pending {
            match read(retry, || gateway.tx_status(ticket)).await? {
                TxStatus::Pending | TxStatus::Confirmed => {
                    self.transition(ClaimFlowState::ClaimPending)?;
                    return self.confirm(gateway, ticket, sink, settings).await;
                }
                TxStatus::Reverted(_) => self.pending = None,
            }
        }

        if info.is_active {
            return Err(LedgerError::PollStillActive.into());
        }
        let (winning_option, winning_tally) = read(retry, || gateway.winner(&poll)).await?;
        let vote = read(retry, || gateway.vote_of(&poll, &claimant)).await?;
        if winning_tally.is_zero() || vote.map_or(true, |v| v.option != winning_option) {
            return Err(LedgerError::NothingToClaim.into());
        }

        self.transition(ClaimFlowState::ClaimPending)?;
        let ticket = match gateway.submit_claim(&claimant, &poll) {
            Ok(ticket) => ticket,
            Err(e) => {
                if e.is_retryable() {
                    self.pending = Some(PendingWrite::Claim(None));
                }
                return Err(e.into());
            }
        };
        self.claims_submitted += 1;
        self.confirm(gateway, ticket, sink, settings).await
    }

    async fn confirm<G>(
        &mut self,
        gateway: &G,
        ticket: TxTicket,
        sink: &dyn InvalidationSink,
        settings: &FlowSettings,
    ) -> Result<ClaimRecord, SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        let (poll, claimant) = (self.poll, self.claimant.clone());
        let confirmed = match await_confirmation(gateway, ticket, settings).await {
            Ok(()) => read(settings.read_retry, || gateway.claim_record(&poll, &claimant)).await,
            Err(e) => Err(e),
        };

        let record = match confirmed {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.pending = Some(PendingWrite::Claim(Some(ticket)));
                return Err(GatewayError::Unavailable(format!("{ticket} confirmed but claim not visible")).into());
            }
            Err(e) => {
                self.pending = (e.category() == ErrorCategory::Transport)
                    .then_some(PendingWrite::Claim(Some(ticket)));
                return Err(e);
            }
        };

        self.pending = None;
        self.transition(ClaimFlowState::ClaimConfirmed)?;
        Ok(self.settle(record, sink))
    }

    fn settle(&mut self, record: ClaimRecord, sink: &dyn InvalidationSink) -> ClaimRecord {
        let poll = self.poll;
        sink.invalidate(Invalidation::ClaimStatus {
            poll,
            claimant: self.claimant.clone(),
        });
        sink.invalidate(Invalidation::Balance {
            owner: self.claimant.clone(),
        });
        sink.invalidate(Invalidation::Tallies { poll });

        let _ = self.transition(ClaimFlowState::Settled);
        tracing::info!(poll = %poll.short(), claimant = %self.claimant, payout = %record.payout, "claim settled");
        self.record = Some(record.clone());
        record
    }

    fn transition(&mut self, next: ClaimFlowState) -> Result<(), SettlementError> {
        if !self.state.can_transition_to(next) {
            return Err(SettlementError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(poll = %self.poll.short(), claimant = %self.claimant, from = %self.state, to = %next, "claim flow transition");
        self.history.push(Transition {
            from: self.state,
            to: next,
        });
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, e: SettlementError) -> SettlementError {
        let next = if is_rejection(&e) {
            ClaimFlowState::Rejected
        } else {
            ClaimFlowState::Failed
        };
        if self.state.can_transition_to(next) {
            let _ = self.transition(next);
        }
        tracing::warn!(
            poll = %self.poll.short(),
            claimant = %self.claimant,
            state = %self.state,
            category = %e.category(),
            error = %e,
            "claim flow stopped"
        );
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_flow_is_idle() {
        let flow = ClaimFlow::new(PollId::new([2; 32]), Identity::new("w"));
        assert_eq!(flow.state(), ClaimFlowState::Idle);
        assert_eq!(flow.claims_submitted(), 0);
        assert!(flow.record().is_none());
    }
}
