//! The per-poll ledger: vote recording, tallies, winner, read queries.

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::poll::{PollConfig, PollInfo};
use crate::vote::{ClaimRecord, Vote};
use qvote_types::{Credits, Identity, Multiplier, PollId, Timestamp, TokenError, Weight};
use qvote_weight::{TallySnapshot, WeightCalculator};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Default capacity of the per-poll event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Mutable voting state, guarded by the poll's write lock.
#[derive(Debug)]
pub(crate) struct PollState {
    pub(crate) tallies: Vec<Weight>,
    pub(crate) total_voters: u64,
    pub(crate) total_weighted: Weight,
    pub(crate) total_bet: Credits,
    pub(crate) votes: HashMap<Identity, Vote>,
    /// Voters in commit order, for deterministic snapshots.
    pub(crate) order: Vec<Identity>,
}

impl PollState {
    fn new(option_count: usize) -> Self {
        Self {
            tallies: vec![Weight::ZERO; option_count],
            total_voters: 0,
            total_weighted: Weight::ZERO,
            total_bet: Credits::ZERO,
            votes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Highest tally; ties go to the lowest option index.
    pub(crate) fn winner(&self) -> (usize, Weight) {
        let mut best = (0, Weight::ZERO);
        for (i, w) in self.tallies.iter().enumerate() {
            if *w > best.1 {
                best = (i, *w);
            }
        }
        best
    }
}

/// Claim bookkeeping. Check-then-mark happens under this one mutex.
#[derive(Debug, Default)]
pub(crate) struct ClaimBook {
    pub(crate) records: HashMap<Identity, ClaimRecord>,
    pub(crate) paid: Credits,
}

/// A point-in-time copy of per-option tallies, ordered by option index.
///
/// Iterating is restartable: call [`Results::iter`] as often as needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Results {
    tallies: Vec<Weight>,
}

impl Results {
    pub fn iter(&self) -> impl Iterator<Item = (usize, Weight)> + '_ {
        self.tallies.iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    pub fn total(&self) -> Option<Weight> {
        self.tallies
            .iter()
            .try_fold(Weight::ZERO, |acc, w| acc.checked_add(*w))
    }

    pub fn into_vec(self) -> Vec<Weight> {
        self.tallies
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a Weight;
    type IntoIter = std::slice::Iter<'a, Weight>;

    fn into_iter(self) -> Self::IntoIter {
        self.tallies.iter()
    }
}

/// Authoritative state of one poll.
pub struct PollLedger {
    config: PollConfig,
    calculator: WeightCalculator,
    pub(crate) state: RwLock<PollState>,
    pub(crate) claims: Mutex<ClaimBook>,
    pub(crate) events: broadcast::Sender<LedgerEvent>,
}

impl PollLedger {
    pub fn new(config: PollConfig) -> Self {
        Self::with_event_capacity(config, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(config: PollConfig, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let calculator = WeightCalculator::new(config.max_credits_per_vote);
        let state = PollState::new(config.option_count());
        Self {
            config,
            calculator,
            state: RwLock::new(state),
            claims: Mutex::new(ClaimBook::default()),
            events,
        }
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, PollState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, PollState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn claim_book(&self) -> MutexGuard<'_, ClaimBook> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &PollId {
        &self.config.id
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn calculator(&self) -> &WeightCalculator {
        &self.calculator
    }

    /// Subscribe to `VoteRecorded` / `Claimed` events for this poll.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: LedgerEvent) {
        // No receivers is fine; read-models may not be attached yet.
        let _ = self.events.send(event);
    }

    /// Record a vote with no token escrow.
    pub fn record_vote(
        &self,
        voter: &Identity,
        option: usize,
        credits: Credits,
        multiplier: Multiplier,
        now: Timestamp,
    ) -> Result<Vote, LedgerError> {
        self.record_vote_with(voter, option, credits, multiplier, now, |_| Ok(()))
    }

    /// Record a vote, calling `charge` after validation and before commit.
    ///
    /// `charge` runs under the poll's write lock; if it fails nothing is
    /// committed. This is where the stake is moved into escrow.
    pub fn record_vote_with<F>(
        &self,
        voter: &Identity,
        option: usize,
        credits: Credits,
        multiplier: Multiplier,
        now: Timestamp,
        charge: F,
    ) -> Result<Vote, LedgerError>
    where
        F: FnOnce(Credits) -> Result<(), TokenError>,
    {
        if !voter.is_valid() || voter.is_escrow() {
            return Err(LedgerError::InvalidIdentity(voter.to_string()));
        }

        let mut state = self.write_state();

        if state.votes.contains_key(voter) {
            return Err(LedgerError::AlreadyVoted(voter.clone()));
        }
        if !self.config.is_active(now) {
            return Err(LedgerError::PollClosed);
        }
        if option >= state.tallies.len() {
            return Err(LedgerError::InvalidOption {
                option,
                count: state.tallies.len(),
            });
        }

        let snapshot = TallySnapshot::new(
            state.total_voters,
            state.total_weighted,
            self.config.max_weight_cap,
        );
        let outcome = self.calculator.compute(credits, multiplier, &snapshot)?;

        let new_tally = state.tallies[option]
            .checked_add(outcome.applied)
            .ok_or(LedgerError::Overflow)?;
        let new_total = state
            .total_weighted
            .checked_add(outcome.applied)
            .ok_or(LedgerError::Overflow)?;
        let new_bet = state
            .total_bet
            .checked_add(credits)
            .ok_or(LedgerError::Overflow)?;
        let new_voters = state
            .total_voters
            .checked_add(1)
            .ok_or(LedgerError::Overflow)?;

        charge(credits)?;

        let vote = Vote {
            voter: voter.clone(),
            option,
            credits,
            weight: outcome.applied,
            raw_weight: outcome.raw,
            timestamp: now,
        };
        state.tallies[option] = new_tally;
        state.total_weighted = new_total;
        state.total_bet = new_bet;
        state.total_voters = new_voters;
        state.votes.insert(voter.clone(), vote.clone());
        state.order.push(voter.clone());
        drop(state);

        tracing::info!(
            poll = %self.config.id.short(),
            %voter,
            option,
            credits = credits.raw(),
            weight = %vote.weight,
            capped = vote.was_capped(),
            "vote recorded"
        );

        self.emit(LedgerEvent::VoteRecorded {
            poll: self.config.id,
            voter: voter.clone(),
            option,
            credits,
            weight: vote.weight,
            total_voters: new_voters,
            total_weighted: new_total,
            at: now,
        });

        Ok(vote)
    }

    /// Per-option tallies ordered by option index.
    pub fn results(&self) -> Results {
        Results {
            tallies: self.read_state().tallies.clone(),
        }
    }

    pub fn results_vec(&self) -> Vec<Weight> {
        self.results().into_vec()
    }

    /// `(option, weight)` of the leading option; ties go to the lowest index.
    pub fn winner(&self) -> (usize, Weight) {
        self.read_state().winner()
    }

    /// Totals a vote submitted right now would be weighted against.
    pub fn tally_snapshot(&self) -> TallySnapshot {
        let state = self.read_state();
        TallySnapshot::new(
            state.total_voters,
            state.total_weighted,
            self.config.max_weight_cap,
        )
    }

    pub fn info(&self, now: Timestamp) -> PollInfo {
        let state = self.read_state();
        PollInfo {
            id: self.config.id,
            question: self.config.question.clone(),
            options: self.config.options.clone(),
            creator: self.config.creator.clone(),
            created_at: self.config.created_at,
            end_time: self.config.end_time,
            is_active: self.config.is_active(now),
            max_weight_cap: self.config.max_weight_cap,
            max_credits_per_vote: self.config.max_credits_per_vote,
            total_voters: state.total_voters,
            total_weighted_votes: state.total_weighted,
            total_bet_amount: state.total_bet,
        }
    }

    pub fn total_voters(&self) -> u64 {
        self.read_state().total_voters
    }

    pub fn total_weighted_votes(&self) -> Weight {
        self.read_state().total_weighted
    }

    pub fn total_bet_amount(&self) -> Credits {
        self.read_state().total_bet
    }

    /// Credits staked by `voter` (zero if they have not voted).
    pub fn user_bet(&self, voter: &Identity) -> Credits {
        self.read_state()
            .votes
            .get(voter)
            .map(|v| v.credits)
            .unwrap_or(Credits::ZERO)
    }

    pub fn vote_of(&self, voter: &Identity) -> Option<Vote> {
        self.read_state().votes.get(voter).cloned()
    }

    pub fn has_voted(&self, voter: &Identity) -> bool {
        self.read_state().votes.contains_key(voter)
    }

    /// All votes in commit order.
    pub fn votes(&self) -> Vec<Vote> {
        let state = self.read_state();
        state
            .order
            .iter()
            .filter_map(|id| state.votes.get(id).cloned())
            .collect()
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        self.config.is_active(now)
    }

    pub fn end_time(&self) -> Timestamp {
        self.config.end_time
    }

    pub fn max_weight_cap(&self) -> u32 {
        self.config.max_weight_cap
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn config(options: &[&str], cap: u32, max_credits: u128) -> PollConfig {
        PollConfig {
            id: PollId::new([9u8; 32]),
            question: "Ship it?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            creator: Identity::new("creator"),
            created_at: Timestamp::new(1_000),
            end_time: Timestamp::new(2_000),
            max_weight_cap: cap,
            max_credits_per_vote: max_credits,
        }
    }

    pub(crate) fn units(n: u128) -> Weight {
        Weight::from_units(n).unwrap()
    }

    fn assert_conserved(ledger: &PollLedger) {
        assert_eq!(ledger.results().total(), Some(ledger.total_weighted_votes()));
    }

    #[test]
    fn scenario_a_results_and_winner() {
        let ledger = PollLedger::new(config(&["Yes", "No"], 10, 100));
        let now = Timestamp::new(1_500);
        ledger
            .record_vote(&"alice".into(), 0, Credits::new(9), Multiplier::ONE, now)
            .unwrap();
        ledger
            .record_vote(&"bob".into(), 1, Credits::new(16), Multiplier::from_tenths(20), now)
            .unwrap();

        assert_eq!(ledger.results().into_vec(), vec![units(3), units(8)]);
        assert_eq!(ledger.winner(), (1, units(8)));
        assert_eq!(ledger.winner().1.to_string(), "8.00");
        assert_eq!(ledger.total_voters(), 2);
        assert_eq!(ledger.total_bet_amount(), Credits::new(25));
        assert_conserved(&ledger);
    }

    #[test]
    fn scenario_b_second_vote_rejected_and_tallies_unchanged() {
        let ledger = PollLedger::new(config(&["Yes", "No"], 10, 100));
        let now = Timestamp::new(1_500);
        let alice = Identity::new("alice");
        ledger
            .record_vote(&alice, 0, Credits::new(9), Multiplier::ONE, now)
            .unwrap();
        let before = ledger.results();
        let totals_before = ledger.tally_snapshot();

        let err = ledger
            .record_vote(&alice, 1, Credits::new(4), Multiplier::ONE, now)
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyVoted(alice.clone()));
        assert_eq!(ledger.results(), before);
        assert_eq!(ledger.tally_snapshot(), totals_before);
        assert_eq!(ledger.user_bet(&alice), Credits::new(9));
    }

    #[test]
    fn scenario_c_cap_applied_at_ledger() {
        let ledger = PollLedger::new(config(&["A", "B"], 2, 1_000));
        let now = Timestamp::new(1_500);
        let first = ledger
            .record_vote(&"first".into(), 0, Credits::new(100), Multiplier::ONE, now)
            .unwrap();
        assert_eq!(first.weight, units(10));
        let second = ledger
            .record_vote(&"whale".into(), 1, Credits::new(625), Multiplier::from_tenths(20), now)
            .unwrap();
        assert_eq!(second.raw_weight, units(50));
        assert_eq!(second.weight, units(20));
        assert!(second.was_capped());
        assert_eq!(ledger.total_weighted_votes(), units(30));
        assert_conserved(&ledger);
    }

    #[test]
    fn closed_poll_rejects_votes() {
        let ledger = PollLedger::new(config(&["A", "B"], 2, 100));
        let err = ledger
            .record_vote(&"late".into(), 0, Credits::new(1), Multiplier::ONE, Timestamp::new(2_000))
            .unwrap_err();
        assert_eq!(err, LedgerError::PollClosed);
        assert!(ledger.is_active(Timestamp::new(1_999)));
        assert!(!ledger.is_active(Timestamp::new(2_000)));
    }

    #[test]
    fn validation_failures() {
        let ledger = PollLedger::new(config(&["A", "B"], 2, 100));
        let now = Timestamp::new(1_500);
        assert_eq!(
            ledger.record_vote(&"v".into(), 2, Credits::new(1), Multiplier::ONE, now),
            Err(LedgerError::InvalidOption { option: 2, count: 2 })
        );
        assert!(matches!(
            ledger.record_vote(&"v".into(), 0, Credits::ZERO, Multiplier::ONE, now),
            Err(LedgerError::Weight(qvote_weight::WeightError::InvalidCredits))
        ));
        assert!(matches!(
            ledger.record_vote(&"v".into(), 0, Credits::new(101), Multiplier::ONE, now),
            Err(LedgerError::Weight(qvote_weight::WeightError::CreditsExceedMax { .. }))
        ));
        assert!(matches!(
            ledger.record_vote(&"".into(), 0, Credits::new(1), Multiplier::ONE, now),
            Err(LedgerError::InvalidIdentity(_))
        ));
        assert_eq!(ledger.total_voters(), 0);
    }

    #[test]
    fn failed_charge_commits_nothing() {
        let ledger = PollLedger::new(config(&["A", "B"], 2, 100));
        let now = Timestamp::new(1_500);
        let err = ledger
            .record_vote_with(&"poor".into(), 0, Credits::new(5), Multiplier::ONE, now, |_| {
                Err(TokenError::InsufficientBalance { needed: 5, available: 1 })
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Token(_)));
        assert_eq!(err.category(), qvote_types::ErrorCategory::Resource);
        assert!(!ledger.has_voted(&"poor".into()));
        assert_eq!(ledger.total_bet_amount(), Credits::ZERO);
    }

    #[test]
    fn tie_goes_to_lowest_index() {
        let ledger = PollLedger::new(config(&["A", "B", "C"], 10, 100));
        let now = Timestamp::new(1_500);
        ledger
            .record_vote(&"x".into(), 2, Credits::new(4), Multiplier::ONE, now)
            .unwrap();
        ledger
            .record_vote(&"y".into(), 1, Credits::new(4), Multiplier::ONE, now)
            .unwrap();
        assert_eq!(ledger.winner(), (1, units(2)));
    }

    #[test]
    fn winner_of_empty_poll_is_option_zero_with_no_weight() {
        let ledger = PollLedger::new(config(&["A", "B"], 2, 100));
        assert_eq!(ledger.winner(), (0, Weight::ZERO));
    }

    #[test]
    fn results_are_restartable() {
        let ledger = PollLedger::new(config(&["A", "B"], 10, 100));
        ledger
            .record_vote(&"x".into(), 1, Credits::new(9), Multiplier::ONE, Timestamp::new(1_500))
            .unwrap();
        let results = ledger.results();
        let first: Vec<_> = results.iter().collect();
        let second: Vec<_> = results.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![(0, Weight::ZERO), (1, units(3))]);
    }

    #[tokio::test]
    async fn vote_recorded_event_is_broadcast() {
        let ledger = PollLedger::new(config(&["A", "B"], 10, 100));
        let mut rx = ledger.subscribe();
        ledger
            .record_vote(&"x".into(), 1, Credits::new(9), Multiplier::ONE, Timestamp::new(1_500))
            .unwrap();
        match rx.recv().await.unwrap() {
            LedgerEvent::VoteRecorded { voter, option, weight, total_voters, .. } => {
                assert_eq!(voter, Identity::new("x"));
                assert_eq!(option, 1);
                assert_eq!(weight, units(3));
                assert_eq!(total_voters, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn concurrent_duplicate_votes_record_exactly_once() {
        use std::sync::Arc;
        let ledger = Arc::new(PollLedger::new(config(&["A", "B"], 10, 100)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let l = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    l.record_vote(&"same".into(), i % 2, Credits::new(4), Multiplier::ONE, Timestamp::new(1_500))
                        .is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(ledger.total_voters(), 1);
        assert_conserved(&ledger);
    }
}
