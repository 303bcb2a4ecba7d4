//! The vote flow: allowance check, optional approval, vote, settle.

use crate::confirm::{await_confirmation, read, PendingWrite};
use crate::error::{GatewayError, SettlementError};
use crate::gateway::{PollGateway, TxStatus, TxTicket};
use crate::invalidation::{Invalidation, InvalidationSink};
use crate::outcome::is_rejection;
use crate::settings::FlowSettings;
use crate::state::{Transition, VoteFlowState};
use qvote_ledger::{LedgerError, PollInfo, Vote};
use qvote_types::{Credits, ErrorCategory, Identity, PollId, TokenError};
use qvote_weight::WeightCalculator;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter: Identity,
    pub poll: PollId,
    pub option: usize,
    pub credits: Credits,
}

/// Asked before an allowance increase is submitted.
pub trait ApprovalPrompt: Send + Sync {
    /// `false` cancels the flow. `granted` is the allowance currently in place.
    fn confirm_approval(&self, request: &VoteRequest, granted: Credits) -> bool;
}

/// Approves every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoApprove;

impl ApprovalPrompt for AutoApprove {
    fn confirm_approval(&self, _request: &VoteRequest, _granted: Credits) -> bool {
        true
    }
}

/// One identity's attempt to vote in one poll.
///
/// A flow that ends in `Failed` keeps what it knows about writes whose outcome
/// it never saw. Running it again re-reads ledger state first and settles
/// without resubmitting when the earlier vote turns out to have landed.
#[derive(Debug)]
pub struct VoteFlow {
    request: VoteRequest,
    state: VoteFlowState,
    history: Vec<Transition<VoteFlowState>>,
    pending: Option<PendingWrite>,
    approvals_submitted: u32,
    votes_submitted: u32,
    vote: Option<Vote>,
}

impl VoteFlow {
    pub fn new(request: VoteRequest) -> Self {
        Self {
            request,
            state: VoteFlowState::Idle,
            history: Vec::new(),
            pending: None,
            approvals_submitted: 0,
            votes_submitted: 0,
            vote: None,
        }
    }

    pub fn request(&self) -> &VoteRequest {
        &self.request
    }

    pub fn state(&self) -> VoteFlowState {
        self.state
    }

    pub fn history(&self) -> &[Transition<VoteFlowState>] {
        &self.history
    }

    /// A write was submitted but its outcome was never observed.
    pub fn is_ambiguous(&self) -> bool {
        self.pending.is_some()
    }

    pub fn approvals_submitted(&self) -> u32 {
        self.approvals_submitted
    }

    pub fn votes_submitted(&self) -> u32 {
        self.votes_submitted
    }

    /// The recorded vote, once settled.
    pub fn vote(&self) -> Option<&Vote> {
        self.vote.as_ref()
    }

    /// Drive the flow to `Settled`, `Rejected`, or `Failed`.
    ///
    /// A `Failed` flow may be run again; a settled one returns its vote.
    pub async fn run<G>(
        &mut self,
        gateway: &G,
        prompt: &dyn ApprovalPrompt,
        sink: &dyn InvalidationSink,
        settings: &FlowSettings,
    ) -> Result<Vote, SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        if let (VoteFlowState::Settled, Some(vote)) = (self.state, &self.vote) {
            return Ok(vote.clone());
        }
        match self.state {
            VoteFlowState::Idle => {}
            VoteFlowState::Failed => self.transition(VoteFlowState::Idle)?,
            state => {
                return Err(SettlementError::IllegalTransition {
                    from: state.to_string(),
                    to: VoteFlowState::AllowanceCheck.to_string(),
                })
            }
        }

        match self.drive(gateway, prompt, sink, settings).await {
            Ok(vote) => Ok(vote),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn drive<G>(
        &mut self,
        gateway: &G,
        prompt: &dyn ApprovalPrompt,
        sink: &dyn InvalidationSink,
        settings: &FlowSettings,
    ) -> Result<Vote, SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        self.transition(VoteFlowState::AllowanceCheck)?;
        let req = self.request.clone();
        let retry = settings.read_retry;

        let info = read(retry, || gateway.poll_info(&req.poll)).await?;

        if let Some(existing) = read(retry, || gateway.vote_of(&req.poll, &req.voter)).await? {
            let ours = matches!(self.pending, Some(PendingWrite::Vote(_)))
                && existing.matches(req.option, req.credits);
            if !ours {
                return Err(LedgerError::AlreadyVoted(req.voter.clone()).into());
            }
            tracing::info!(
                poll = %req.poll.short(),
                voter = %req.voter,
                "earlier vote found on retry, not resubmitting"
            );
            self.pending = None;
            self.transition(VoteFlowState::VoteConfirmed)?;
            return Ok(self.settle(existing, sink));
        }

        if let Some(PendingWrite::Vote(Some(ticket))) = self.pending {
            match read(retry, || gateway.tx_status(ticket)).await? {
                TxStatus::Pending | TxStatus::Confirmed => {
                    tracing::info!(poll = %req.poll.short(), voter = %req.voter, %ticket, "resuming earlier vote");
                    self.transition(VoteFlowState::VotePending)?;
                    return self.confirm_vote(gateway, ticket, sink, settings).await;
                }
                TxStatus::Reverted(_) => self.pending = None,
            }
        }

        precheck(&req, &info)?;

        let balance = read(retry, || gateway.balance(&req.voter)).await?;
        if balance < req.credits {
            return Err(TokenError::InsufficientBalance {
                needed: req.credits.raw(),
                available: balance.raw(),
            }
            .into());
        }

        let granted = read(retry, || gateway.allowance(&req.voter, &req.poll)).await?;
        if granted < req.credits {
            self.approve(gateway, prompt, granted, settings).await?;
        }

        self.transition(VoteFlowState::VotePending)?;
        let ticket = match gateway.submit_vote(&req.voter, &req.poll, req.option, req.credits) {
            Ok(ticket) => ticket,
            Err(e) => {
                if e.is_retryable() {
                    self.pending = Some(PendingWrite::Vote(None));
                }
                return Err(e.into());
            }
        };
        self.votes_submitted += 1;
        tracing::debug!(poll = %req.poll.short(), voter = %req.voter, %ticket, "vote submitted");
        self.confirm_vote(gateway, ticket, sink, settings).await
    }

    async fn approve<G>(
        &mut self,
        gateway: &G,
        prompt: &dyn ApprovalPrompt,
        granted: Credits,
        settings: &FlowSettings,
    ) -> Result<(), SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        self.transition(VoteFlowState::NeedsApproval)?;
        if !prompt.confirm_approval(&self.request, granted) {
            return Err(SettlementError::UserCancelled);
        }

        let req = &self.request;
        let ticket = gateway.submit_approval(&req.voter, &req.poll, req.credits)?;
        self.approvals_submitted += 1;
        self.transition(VoteFlowState::ApprovalPending)?;

        if let Err(e) = await_confirmation(gateway, ticket, settings).await {
            if e.category() == ErrorCategory::Transport {
                self.pending = Some(PendingWrite::Approval(ticket));
            }
            return Err(e);
        }
        if matches!(self.pending, Some(PendingWrite::Approval(_))) {
            self.pending = None;
        }
        self.transition(VoteFlowState::ApprovalConfirmed)
    }

    async fn confirm_vote<G>(
        &mut self,
        gateway: &G,
        ticket: TxTicket,
        sink: &dyn InvalidationSink,
        settings: &FlowSettings,
    ) -> Result<Vote, SettlementError>
    where
        G: PollGateway + ?Sized,
    {
        let req = self.request.clone();
        let confirmed = match await_confirmation(gateway, ticket, settings).await {
            Ok(()) => read(settings.read_retry, || gateway.vote_of(&req.poll, &req.voter)).await,
            Err(e) => Err(e),
        };

        let vote = match confirmed {
            Ok(Some(vote)) => vote,
            Ok(None) => {
                self.pending = Some(PendingWrite::Vote(Some(ticket)));
                return Err(GatewayError::Unavailable(format!("{ticket} confirmed but vote not visible")).into());
            }
            Err(e) => {
                if e.category() == ErrorCategory::Transport {
                    self.pending = Some(PendingWrite::Vote(Some(ticket)));
                } else {
                    self.pending = None;
                }
                return Err(e);
            }
        };

        self.pending = None;
        self.transition(VoteFlowState::VoteConfirmed)?;
        Ok(self.settle(vote, sink))
    }

    fn settle(&mut self, vote: Vote, sink: &dyn InvalidationSink) -> Vote {
        let poll = self.request.poll;
        let voter = self.request.voter.clone();
        sink.invalidate(Invalidation::Tallies { poll });
        sink.invalidate(Invalidation::Leaderboard);
        sink.invalidate(Invalidation::VoteStatus { poll, voter: voter.clone() });
        sink.invalidate(Invalidation::Balance { owner: voter });

        // VoteConfirmed -> Settled is always legal.
        let _ = self.transition(VoteFlowState::Settled);
        tracing::info!(
            poll = %poll.short(),
            voter = %vote.voter,
            option = vote.option,
            weight = %vote.weight,
            capped = vote.was_capped(),
            "vote settled"
        );
        self.vote = Some(vote.clone());
        vote
    }

    fn transition(&mut self, next: VoteFlowState) -> Result<(), SettlementError> {
        if !self.state.can_transition_to(next) {
            return Err(SettlementError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(
            poll = %self.request.poll.short(),
            voter = %self.request.voter,
            from = %self.state,
            to = %next,
            "vote flow transition"
        );
        self.history.push(Transition {
            from: self.state,
            to: next,
        });
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, e: SettlementError) -> SettlementError {
        let next = if is_rejection(&e) {
            VoteFlowState::Rejected
        } else {
            VoteFlowState::Failed
        };
        if self.state.can_transition_to(next) {
            let _ = self.transition(next);
        }
        tracing::warn!(
            poll = %self.request.poll.short(),
            voter = %self.request.voter,
            state = %self.state,
            category = %e.category(),
            ambiguous = self.is_ambiguous(),
            error = %e,
            "vote flow stopped"
        );
        e
    }
}

/// Checks answerable from the poll view alone.
fn precheck(req: &VoteRequest, info: &PollInfo) -> Result<(), LedgerError> {
    if !info.is_active {
        return Err(LedgerError::PollClosed);
    }
    if req.option >= info.options.len() {
        return Err(LedgerError::InvalidOption {
            option: req.option,
            count: info.options.len(),
        });
    }
    WeightCalculator::new(info.max_credits_per_vote).validate_credits(req.credits)?;
    Ok(())
}
