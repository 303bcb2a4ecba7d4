//! In-process gateway over the poll registry and the stake token.
//!
//! Writes are queued onto the per-poll writer and report through tickets.
//! Finished tickets are kept for a bounded window, oldest dropped first.
//! Votes escrow their stake inside the ledger's write lock; claims pay out
//! inside the claim lock. Outside a Tokio runtime writes execute inline.

use crate::poll_writer::PollWriter;
use qvote_ledger::{ClaimRecord, LedgerEvent, PollInfo, PollLedger, Vote};
use qvote_registry::PollRegistry;
use qvote_settlement::{GatewayError, PollGateway, TxKind, TxStatus, TxTicket};
use qvote_types::{Clock, Credits, Identity, PollId, ReputationOracle, StakeToken, Timestamp, Weight};
use qvote_weight::TallySnapshot;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// Finished tickets kept for status reads.
pub const DEFAULT_TICKET_RETENTION: usize = 1_024;

type Tickets = Arc<Mutex<TicketBook>>;

struct TicketBook {
    entries: HashMap<TxTicket, (TxKind, TxStatus)>,
    finished: VecDeque<TxTicket>,
    retention: usize,
}

impl TicketBook {
    fn new(retention: usize) -> Self {
        Self {
            entries: HashMap::new(),
            finished: VecDeque::new(),
            retention: retention.max(1),
        }
    }

    fn issue(&mut self, ticket: TxTicket, kind: TxKind) {
        self.entries.insert(ticket, (kind, TxStatus::Pending));
    }

    fn finish(&mut self, ticket: TxTicket, kind: TxKind, status: TxStatus) {
        self.entries.insert(ticket, (kind, status));
        self.finished.push_back(ticket);
        while self.finished.len() > self.retention {
            if let Some(expired) = self.finished.pop_front() {
                self.entries.remove(&expired);
            }
        }
    }
}

pub struct LocalGateway {
    registry: Arc<PollRegistry>,
    token: Arc<dyn StakeToken>,
    oracle: Arc<dyn ReputationOracle>,
    clock: Arc<dyn Clock>,
    writer: Arc<PollWriter>,
    tickets: Tickets,
    next_ticket: AtomicU64,
    runtime: Option<Handle>,
}

impl LocalGateway {
    pub fn new(
        registry: Arc<PollRegistry>,
        token: Arc<dyn StakeToken>,
        oracle: Arc<dyn ReputationOracle>,
        clock: Arc<dyn Clock>,
        writer: Arc<PollWriter>,
    ) -> Self {
        Self {
            registry,
            token,
            oracle,
            clock,
            writer,
            tickets: Arc::new(Mutex::new(TicketBook::new(DEFAULT_TICKET_RETENTION))),
            next_ticket: AtomicU64::new(1),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Keep at most `retention` finished tickets.
    pub fn with_ticket_retention(self, retention: usize) -> Self {
        *self.tickets.lock().unwrap_or_else(PoisonError::into_inner) = TicketBook::new(retention);
        self
    }

    /// Tickets still readable through `tx_status`.
    pub fn tracked_tickets(&self) -> usize {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn registry(&self) -> &Arc<PollRegistry> {
        &self.registry
    }

    pub fn token(&self) -> &Arc<dyn StakeToken> {
        &self.token
    }

    /// What kind of write `ticket` was issued for.
    pub fn ticket_kind(&self, ticket: TxTicket) -> Option<TxKind> {
        self.tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(&ticket)
            .map(|(kind, _)| *kind)
    }

    fn ledger(&self, poll: &PollId) -> Result<Arc<PollLedger>, GatewayError> {
        Ok(self.registry.poll(poll)?)
    }

    /// Issue a ticket and run `write` behind the poll's writer.
    fn enqueue<F>(&self, kind: TxKind, poll: PollId, write: F) -> TxTicket
    where
        F: FnOnce() -> Result<(), GatewayError> + Send + 'static,
    {
        let ticket = TxTicket::new(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        self.tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issue(ticket, kind);

        match &self.runtime {
            Some(handle) => {
                let writer = Arc::clone(&self.writer);
                let tickets = Arc::clone(&self.tickets);
                handle.spawn(async move {
                    let status = match writer.run(&poll, write).await {
                        Ok(result) => status_of(result),
                        Err(e) => TxStatus::Reverted(GatewayError::Unavailable(e.to_string())),
                    };
                    finish(&tickets, ticket, kind, status);
                });
            }
            None => finish(&self.tickets, ticket, kind, status_of(write())),
        }
        tracing::debug!(poll = %poll.short(), %ticket, ?kind, "write queued");
        ticket
    }
}

fn status_of(result: Result<(), GatewayError>) -> TxStatus {
    match result {
        Ok(()) => TxStatus::Confirmed,
        Err(e) => TxStatus::Reverted(e),
    }
}

fn finish(tickets: &Tickets, ticket: TxTicket, kind: TxKind, status: TxStatus) {
    if let TxStatus::Reverted(reason) = &status {
        tracing::info!(%ticket, ?kind, %reason, "write reverted");
    }
    tickets
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .finish(ticket, kind, status);
}

impl PollGateway for LocalGateway {
    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn poll_info(&self, poll: &PollId) -> Result<PollInfo, GatewayError> {
        Ok(self.registry.poll_info(poll, self.clock.now())?)
    }

    fn poll_snapshot(&self, poll: &PollId) -> Result<TallySnapshot, GatewayError> {
        Ok(self.ledger(poll)?.tally_snapshot())
    }

    fn results(&self, poll: &PollId) -> Result<Vec<Weight>, GatewayError> {
        Ok(self.ledger(poll)?.results_vec())
    }

    fn winner(&self, poll: &PollId) -> Result<(usize, Weight), GatewayError> {
        Ok(self.ledger(poll)?.winner())
    }

    fn vote_of(&self, poll: &PollId, voter: &Identity) -> Result<Option<Vote>, GatewayError> {
        Ok(self.ledger(poll)?.vote_of(voter))
    }

    fn allowance(&self, owner: &Identity, poll: &PollId) -> Result<Credits, GatewayError> {
        Ok(self.token.allowance(owner, &Identity::escrow(poll))?)
    }

    fn balance(&self, owner: &Identity) -> Result<Credits, GatewayError> {
        Ok(self.token.balance_of(owner)?)
    }

    fn claim_record(
        &self,
        poll: &PollId,
        claimant: &Identity,
    ) -> Result<Option<ClaimRecord>, GatewayError> {
        Ok(self.ledger(poll)?.claim_record(claimant))
    }

    fn submit_approval(
        &self,
        owner: &Identity,
        poll: &PollId,
        amount: Credits,
    ) -> Result<TxTicket, GatewayError> {
        let escrow = self.ledger(poll)?.config().escrow();
        let (token, owner) = (Arc::clone(&self.token), owner.clone());
        Ok(self.enqueue(TxKind::Approval, *poll, move || {
            token.approve(&owner, &escrow, amount)?;
            Ok(())
        }))
    }

    fn submit_vote(
        &self,
        voter: &Identity,
        poll: &PollId,
        option: usize,
        credits: Credits,
    ) -> Result<TxTicket, GatewayError> {
        let ledger = self.ledger(poll)?;
        let token = Arc::clone(&self.token);
        let oracle = Arc::clone(&self.oracle);
        let clock = Arc::clone(&self.clock);
        let voter = voter.clone();
        Ok(self.enqueue(TxKind::Vote, *poll, move || {
            let multiplier = oracle.multiplier(&voter)?;
            let escrow = ledger.config().escrow();
            ledger.record_vote_with(&voter, option, credits, multiplier, clock.now(), |stake| {
                token.transfer_from(&voter, &escrow, stake)
            })?;
            Ok(())
        }))
    }

    fn submit_claim(&self, claimant: &Identity, poll: &PollId) -> Result<TxTicket, GatewayError> {
        let ledger = self.ledger(poll)?;
        let token = Arc::clone(&self.token);
        let clock = Arc::clone(&self.clock);
        let claimant = claimant.clone();
        Ok(self.enqueue(TxKind::Claim, *poll, move || {
            let escrow = ledger.config().escrow();
            ledger.claim_with(&claimant, clock.now(), |payout| {
                token.transfer(&escrow, &claimant, payout)
            })?;
            Ok(())
        }))
    }

    fn tx_status(&self, ticket: TxTicket) -> Result<TxStatus, GatewayError> {
        self.tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(&ticket)
            .map(|(_, status)| status.clone())
            .ok_or(GatewayError::UnknownTicket(ticket))
    }

    fn subscribe(&self, poll: &PollId) -> Option<broadcast::Receiver<LedgerEvent>> {
        self.registry.poll(poll).ok().map(|ledger| ledger.subscribe())
    }
}
