//! A gateway wrapper that misbehaves on request.
//!
//! Wraps a working gateway and can fail reads, fail submissions in transit,
//! or hide confirmations so flows time out while the write has in fact
//! landed. Counts every submission that reaches the inner gateway.

use qvote_ledger::{ClaimRecord, LedgerEvent, PollInfo, Vote};
use qvote_settlement::{GatewayError, PollGateway, TxStatus, TxTicket};
use qvote_types::{Credits, Identity, PollId, Timestamp, Weight};
use qvote_weight::TallySnapshot;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct FlakyGateway<G: ?Sized> {
    inner: Arc<G>,
    failing_reads: AtomicU32,
    hide_confirmations: AtomicBool,
    fail_submissions: AtomicBool,
    push_enabled: AtomicBool,
    approvals: AtomicU32,
    votes: AtomicU32,
    claims: AtomicU32,
}

impl<G: PollGateway + ?Sized> FlakyGateway<G> {
    pub fn new(inner: Arc<G>) -> Self {
        Self {
            inner,
            failing_reads: AtomicU32::new(0),
            hide_confirmations: AtomicBool::new(false),
            fail_submissions: AtomicBool::new(false),
            push_enabled: AtomicBool::new(true),
            approvals: AtomicU32::new(0),
            votes: AtomicU32::new(0),
            claims: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<G> {
        &self.inner
    }

    /// The next `n` reads fail with `GatewayError::Unavailable`.
    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// While set, `tx_status` reports every ticket as pending.
    pub fn hide_confirmations(&self, hide: bool) {
        self.hide_confirmations.store(hide, Ordering::SeqCst);
    }

    /// While set, submissions are forwarded but then reported as lost in transit.
    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Turn push notifications off to force interval polling.
    pub fn set_push(&self, enabled: bool) {
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn approvals_submitted(&self) -> u32 {
        self.approvals.load(Ordering::SeqCst)
    }

    pub fn votes_submitted(&self) -> u32 {
        self.votes.load(Ordering::SeqCst)
    }

    pub fn claims_submitted(&self) -> u32 {
        self.claims.load(Ordering::SeqCst)
    }

    fn read_gate(&self) -> Result<(), GatewayError> {
        let consumed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(GatewayError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    fn after_submit(&self, ticket: TxTicket) -> Result<TxTicket, GatewayError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(format!("{ticket} lost in transit")));
        }
        Ok(ticket)
    }
}

impl<G: PollGateway + ?Sized> PollGateway for FlakyGateway<G> {
    fn now(&self) -> Timestamp {
        self.inner.now()
    }

    fn poll_info(&self, poll: &PollId) -> Result<PollInfo, GatewayError> {
        self.read_gate()?;
        self.inner.poll_info(poll)
    }

    fn poll_snapshot(&self, poll: &PollId) -> Result<TallySnapshot, GatewayError> {
        self.read_gate()?;
        self.inner.poll_snapshot(poll)
    }

    fn results(&self, poll: &PollId) -> Result<Vec<Weight>, GatewayError> {
        self.read_gate()?;
        self.inner.results(poll)
    }

    fn winner(&self, poll: &PollId) -> Result<(usize, Weight), GatewayError> {
        self.read_gate()?;
        self.inner.winner(poll)
    }

    fn vote_of(&self, poll: &PollId, voter: &Identity) -> Result<Option<Vote>, GatewayError> {
        self.read_gate()?;
        self.inner.vote_of(poll, voter)
    }

    fn allowance(&self, owner: &Identity, poll: &PollId) -> Result<Credits, GatewayError> {
        self.read_gate()?;
        self.inner.allowance(owner, poll)
    }

    fn balance(&self, owner: &Identity) -> Result<Credits, GatewayError> {
        self.read_gate()?;
        self.inner.balance(owner)
    }

    fn claim_record(
        &self,
        poll: &PollId,
        claimant: &Identity,
    ) -> Result<Option<ClaimRecord>, GatewayError> {
        self.read_gate()?;
        self.inner.claim_record(poll, claimant)
    }

    fn submit_approval(
        &self,
        owner: &Identity,
        poll: &PollId,
        amount: Credits,
    ) -> Result<TxTicket, GatewayError> {
        let ticket = self.inner.submit_approval(owner, poll, amount)?;
        self.approvals.fetch_add(1, Ordering::SeqCst);
        self.after_submit(ticket)
    }

    fn submit_vote(
        &self,
        voter: &Identity,
        poll: &PollId,
        option: usize,
        credits: Credits,
    ) -> Result<TxTicket, GatewayError> {
        let ticket = self.inner.submit_vote(voter, poll, option, credits)?;
        self.votes.fetch_add(1, Ordering::SeqCst);
        self.after_submit(ticket)
    }

    fn submit_claim(&self, claimant: &Identity, poll: &PollId) -> Result<TxTicket, GatewayError> {
        let ticket = self.inner.submit_claim(claimant, poll)?;
        self.claims.fetch_add(1, Ordering::SeqCst);
        self.after_submit(ticket)
    }

    fn tx_status(&self, ticket: TxTicket) -> Result<TxStatus, GatewayError> {
        if self.hide_confirmations.load(Ordering::SeqCst) {
            return Ok(TxStatus::Pending);
        }
        self.inner.tx_status(ticket)
    }

    fn subscribe(&self, poll: &PollId) -> Option<broadcast::Receiver<LedgerEvent>> {
        if !self.push_enabled.load(Ordering::SeqCst) {
            return None;
        }
        self.inner.subscribe(poll)
    }
}
