//! The engine service.
//!
//! [`VoteEngine`] is what a presentation layer talks to. Commands run as
//! background settlement flows and hand back a [`SubmissionHandle`]; queries
//! read the registry, the gateway and the oracle directly. A flow that fails
//! with an unobserved write is parked under (poll, identity) and resumed by
//! the next identical command, so a retry never writes twice.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::handle::SubmissionHandle;
use crate::local::LocalGateway;
use crate::metrics::EngineMetrics;
use crate::poll_writer::PollWriter;
use crate::read_model::{LeaderboardEntry, ReadModels};
use crate::watcher::{PollNotification, PollWatcher};
use futures_util::stream::BoxStream;
use qvote_ledger::{ClaimRecord, LedgerSnapshot, PollInfo, PollLedger, Vote};
use qvote_registry::{PollRegistry, PollRequest};
use qvote_settlement::{
    ApprovalPrompt, AutoApprove, ClaimFlow, FlowOutcome, InvalidationSink, PollGateway, VoteFlow,
    VoteRequest,
};
use qvote_types::{
    Clock, Credits, Identity, PollId, ReputationOracle, StakeToken, Timestamp, UserStats, Weight,
};
use qvote_weight::WeightOutcome;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

type FlowKey = (PollId, Identity);

pub struct VoteEngine {
    config: EngineConfig,
    registry: Arc<PollRegistry>,
    gateway: Arc<dyn PollGateway>,
    oracle: Arc<dyn ReputationOracle>,
    clock: Arc<dyn Clock>,
    prompt: Arc<dyn ApprovalPrompt>,
    read_models: Arc<ReadModels>,
    metrics: Arc<EngineMetrics>,
    parked_votes: Mutex<HashMap<FlowKey, VoteFlow>>,
    parked_claims: Mutex<HashMap<FlowKey, ClaimFlow>>,
}

impl VoteEngine {
    /// `gateway` must front the same `registry`.
    pub fn new(
        config: EngineConfig,
        registry: Arc<PollRegistry>,
        gateway: Arc<dyn PollGateway>,
        oracle: Arc<dyn ReputationOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let read_models = Arc::new(ReadModels::new(config.event_capacity));
        Ok(Self {
            config,
            registry,
            gateway,
            oracle,
            clock,
            prompt: Arc::new(AutoApprove),
            read_models,
            metrics: Arc::new(EngineMetrics::new()?),
            parked_votes: Mutex::new(HashMap::new()),
            parked_claims: Mutex::new(HashMap::new()),
        })
    }

    /// An engine over a fresh registry and an in-process gateway.
    pub fn local(
        config: EngineConfig,
        token: Arc<dyn StakeToken>,
        oracle: Arc<dyn ReputationOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let registry = Arc::new(
            PollRegistry::with_limits(config.poll_limits()).with_event_capacity(config.event_capacity),
        );
        let writer = Arc::new(PollWriter::new(config.max_concurrent_writes));
        let gateway = Arc::new(LocalGateway::new(
            Arc::clone(&registry),
            token,
            Arc::clone(&oracle),
            Arc::clone(&clock),
            writer,
        ));
        Self::new(config, registry, gateway, oracle, clock)
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn ApprovalPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PollRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<dyn PollGateway> {
        &self.gateway
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn read_models(&self) -> &Arc<ReadModels> {
        &self.read_models
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn ledger(&self, poll: &PollId) -> Result<Arc<PollLedger>, EngineError> {
        Ok(self.registry.poll(poll)?)
    }

    // ── Commands ────────────────────────────────────────────────────────

    pub fn create_poll(&self, request: PollRequest) -> Result<PollInfo, EngineError> {
        let now = self.clock.now();
        let ledger = self.registry.create_poll(request, now)?;
        self.metrics.polls_created.inc();
        Ok(ledger.info(now))
    }

    /// Cast a vote in the background. Resumes a parked flow for the same
    /// request instead of starting over.
    pub fn submit_vote(
        self: &Arc<Self>,
        voter: &Identity,
        poll: &PollId,
        option: usize,
        credits: Credits,
    ) -> SubmissionHandle<Vote> {
        let request = VoteRequest {
            voter: voter.clone(),
            poll: *poll,
            option,
            credits,
        };
        self.metrics.votes_submitted.inc();
        let engine = Arc::clone(self);
        SubmissionHandle::new(tokio::spawn(async move { engine.run_vote(request).await }))
    }

    pub fn claim(self: &Arc<Self>, claimant: &Identity, poll: &PollId) -> SubmissionHandle<ClaimRecord> {
        let engine = Arc::clone(self);
        let key = (*poll, claimant.clone());
        SubmissionHandle::new(tokio::spawn(async move { engine.run_claim(key).await }))
    }

    async fn run_vote(&self, request: VoteRequest) -> FlowOutcome<Vote> {
        let key = (request.poll, request.voter.clone());
        let mut flow = match self.unpark(&self.parked_votes, &key) {
            Some(flow) if flow.request() == &request => flow,
            _ => VoteFlow::new(request),
        };

        let started = Instant::now();
        let settings = self.config.flow_settings();
        let sink: &dyn InvalidationSink = self.read_models.as_ref();
        let result = flow
            .run(self.gateway.as_ref(), self.prompt.as_ref(), sink, &settings)
            .await;
        let outcome = FlowOutcome::from_result(result);

        match &outcome {
            FlowOutcome::Confirmed(_) => {
                self.metrics.votes_confirmed.inc();
                self.observe_latency(started);
            }
            FlowOutcome::Rejected(_) => self.metrics.flows_rejected.inc(),
            FlowOutcome::Failed(_) => {
                self.metrics.flows_failed.inc();
                if flow.is_ambiguous() {
                    self.park(&self.parked_votes, key, flow);
                }
            }
        }
        outcome
    }

    async fn run_claim(&self, key: FlowKey) -> FlowOutcome<ClaimRecord> {
        let mut flow = self
            .unpark(&self.parked_claims, &key)
            .unwrap_or_else(|| ClaimFlow::new(key.0, key.1.clone()));

        let started = Instant::now();
        let settings = self.config.flow_settings();
        let sink: &dyn InvalidationSink = self.read_models.as_ref();
        let result = flow.run(self.gateway.as_ref(), sink, &settings).await;
        let outcome = FlowOutcome::from_result(result);

        match &outcome {
            FlowOutcome::Confirmed(_) => {
                self.metrics.claims_paid.inc();
                self.observe_latency(started);
            }
            FlowOutcome::Rejected(_) => self.metrics.flows_rejected.inc(),
            FlowOutcome::Failed(_) => {
                self.metrics.flows_failed.inc();
                if flow.is_ambiguous() {
                    self.park(&self.parked_claims, key, flow);
                }
            }
        }
        outcome
    }

    fn park<F>(&self, parked: &Mutex<HashMap<FlowKey, F>>, key: FlowKey, flow: F) {
        tracing::info!(poll = %key.0.short(), identity = %key.1, "parking ambiguous flow for retry");
        let replaced = parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, flow);
        if replaced.is_none() {
            self.metrics.ambiguous_flows.inc();
        }
    }

    fn unpark<F>(&self, parked: &Mutex<HashMap<FlowKey, F>>, key: &FlowKey) -> Option<F> {
        let flow = parked.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        if flow.is_some() {
            self.metrics.ambiguous_flows.dec();
        }
        flow
    }

    fn observe_latency(&self, started: Instant) {
        self.metrics
            .confirmation_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);
    }

    /// Flows waiting for a retry after an unobserved write.
    pub fn parked_flows(&self) -> usize {
        let votes = self.parked_votes.lock().unwrap_or_else(PoisonError::into_inner).len();
        let claims = self.parked_claims.lock().unwrap_or_else(PoisonError::into_inner).len();
        votes + claims
    }

    // ── Poll queries ────────────────────────────────────────────────────

    pub fn poll_info(&self, poll: &PollId) -> Result<PollInfo, EngineError> {
        Ok(self.gateway.poll_info(poll)?)
    }

    pub fn results(&self, poll: &PollId) -> Result<Vec<Weight>, EngineError> {
        Ok(self.gateway.results(poll)?)
    }

    pub fn winner(&self, poll: &PollId) -> Result<(usize, Weight), EngineError> {
        Ok(self.gateway.winner(poll)?)
    }

    pub fn total_voters(&self, poll: &PollId) -> Result<u64, EngineError> {
        Ok(self.ledger(poll)?.total_voters())
    }

    pub fn total_weighted_votes(&self, poll: &PollId) -> Result<Weight, EngineError> {
        Ok(self.ledger(poll)?.total_weighted_votes())
    }

    pub fn total_bet_amount(&self, poll: &PollId) -> Result<Credits, EngineError> {
        Ok(self.ledger(poll)?.total_bet_amount())
    }

    pub fn user_bet(&self, poll: &PollId, voter: &Identity) -> Result<Credits, EngineError> {
        Ok(self.ledger(poll)?.user_bet(voter))
    }

    pub fn vote_of(&self, poll: &PollId, voter: &Identity) -> Result<Option<Vote>, EngineError> {
        Ok(self.gateway.vote_of(poll, voter)?)
    }

    pub fn has_voted(&self, poll: &PollId, voter: &Identity) -> Result<bool, EngineError> {
        self.read_models.vote_status_or_load(poll, voter, || {
            Ok(self.gateway.vote_of(poll, voter)?.is_some())
        })
    }

    pub fn is_active(&self, poll: &PollId) -> Result<bool, EngineError> {
        Ok(self.ledger(poll)?.is_active(self.clock.now()))
    }

    pub fn end_time(&self, poll: &PollId) -> Result<Timestamp, EngineError> {
        Ok(self.ledger(poll)?.end_time())
    }

    pub fn max_weight_cap(&self, poll: &PollId) -> Result<u32, EngineError> {
        Ok(self.ledger(poll)?.max_weight_cap())
    }

    pub fn has_claimed(&self, poll: &PollId, claimant: &Identity) -> Result<bool, EngineError> {
        Ok(self.gateway.has_claimed(poll, claimant)?)
    }

    /// What `claimant` would receive if they claimed now.
    pub fn payout_preview(&self, poll: &PollId, claimant: &Identity) -> Result<Credits, EngineError> {
        Ok(self.ledger(poll)?.payout_for(claimant, self.clock.now())?)
    }

    /// Stake still held in the poll's escrow.
    pub fn unclaimed_amount(&self, poll: &PollId) -> Result<Credits, EngineError> {
        Ok(self.ledger(poll)?.unclaimed_amount())
    }

    pub fn export_snapshot(&self, poll: &PollId) -> Result<LedgerSnapshot, EngineError> {
        Ok(self.ledger(poll)?.export_snapshot(self.clock.now()))
    }

    pub fn poll_count(&self) -> usize {
        self.registry.poll_count()
    }

    /// Newest first.
    pub fn recent_polls(&self, count: usize) -> Vec<PollInfo> {
        let now = self.clock.now();
        self.registry
            .recent_polls(count)
            .iter()
            .filter_map(|id| self.registry.poll_info(id, now).ok())
            .collect()
    }

    /// The weight `identity` would get for `credits` right now.
    pub fn preview_vote_weight(
        &self,
        identity: &Identity,
        poll: &PollId,
        credits: Credits,
    ) -> Result<WeightOutcome, EngineError> {
        let ledger = self.ledger(poll)?;
        let multiplier = self.oracle.multiplier(identity)?;
        let snapshot = self.gateway.poll_snapshot(poll)?;
        Ok(ledger.calculator().preview(credits, multiplier, &snapshot)?)
    }

    // ── Identity queries ────────────────────────────────────────────────

    pub fn user_stats(&self, identity: &Identity) -> Result<UserStats, EngineError> {
        Ok(self.oracle.user_stats(identity)?)
    }

    pub fn balance(&self, owner: &Identity) -> Result<Credits, EngineError> {
        self.read_models
            .balance_or_load(owner, || Ok(self.gateway.balance(owner)?))
    }

    /// Every known voter and creator with positive reputation, highest first.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let board = self.read_models.leaderboard_or_load(|| self.load_leaderboard())?;
        Ok(board.into_iter().take(limit).collect())
    }

    fn load_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let mut identities = BTreeSet::new();
        for ledger in self.registry.polls() {
            identities.insert(ledger.config().creator.clone());
            identities.extend(ledger.votes().into_iter().map(|vote| vote.voter));
        }

        let mut board = Vec::new();
        for identity in identities {
            let stats = self.oracle.user_stats(&identity)?;
            if stats.effective_reputation == 0 {
                continue;
            }
            board.push(LeaderboardEntry {
                identity,
                effective_reputation: stats.effective_reputation,
                multiplier: stats.multiplier,
                last_vote: stats.last_vote,
            });
        }
        board.sort_by(|a, b| {
            b.effective_reputation
                .cmp(&a.effective_reputation)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        Ok(board)
    }

    // ── Live views ──────────────────────────────────────────────────────

    pub fn watcher(&self, poll: &PollId) -> Result<PollWatcher, EngineError> {
        self.registry.poll(poll)?;
        Ok(PollWatcher::new(
            Arc::clone(&self.gateway),
            *poll,
            self.config.refresh_interval(),
            self.config.read_retry(),
        ))
    }

    /// Notifications for `poll` until it settles.
    pub fn subscribe(&self, poll: &PollId) -> Result<BoxStream<'static, PollNotification>, EngineError> {
        Ok(self.watcher(poll)?.stream())
    }
}
