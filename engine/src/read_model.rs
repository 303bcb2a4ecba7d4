//! Cached views that settlement flows invalidate.
//!
//! Only per-identity views (vote status, balances) and the leaderboard are
//! cached; tallies change with every voter and are always read fresh.
//! Every invalidation is re-broadcast so presentation layers can refresh.
//!
//! Loads run without the cache lock held. Each cache carries a generation
//! that every invalidation bumps; a load only stores its value if no
//! invalidation landed while it ran.

use qvote_settlement::{Invalidation, InvalidationSink};
use qvote_types::{Credits, Identity, Multiplier, PollId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub identity: Identity,
    pub effective_reputation: u128,
    pub multiplier: Multiplier,
    pub last_vote: Option<Timestamp>,
}

/// A map whose fills are discarded if an invalidation raced them.
struct Generational<K, V> {
    entries: HashMap<K, V>,
    generation: u64,
}

impl<K: Eq + Hash, V: Clone> Generational<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            generation: 0,
        }
    }

    fn get(&self, key: &K) -> Result<V, u64> {
        self.entries.get(key).cloned().ok_or(self.generation)
    }

    fn fill(&mut self, key: K, value: V, seen: u64) {
        if self.generation == seen {
            self.entries.insert(key, value);
        }
    }

    fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
        self.generation += 1;
    }
}

type Cache<K, V> = Mutex<Generational<K, V>>;

fn lock<K, V>(cache: &Cache<K, V>) -> MutexGuard<'_, Generational<K, V>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ReadModels {
    leaderboard: Cache<(), Vec<LeaderboardEntry>>,
    vote_status: Cache<(PollId, Identity), bool>,
    balances: Cache<Identity, Credits>,
    invalidations: broadcast::Sender<Invalidation>,
    received: AtomicU64,
}

impl ReadModels {
    pub fn new(capacity: usize) -> Self {
        let (invalidations, _) = broadcast::channel(capacity.max(1));
        Self {
            leaderboard: Mutex::new(Generational::new()),
            vote_status: Mutex::new(Generational::new()),
            balances: Mutex::new(Generational::new()),
            invalidations,
            received: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }

    pub fn invalidations_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn leaderboard_or_load<E>(
        &self,
        load: impl FnOnce() -> Result<Vec<LeaderboardEntry>, E>,
    ) -> Result<Vec<LeaderboardEntry>, E> {
        let seen = match lock(&self.leaderboard).get(&()) {
            Ok(cached) => return Ok(cached),
            Err(generation) => generation,
        };
        let fresh = load()?;
        lock(&self.leaderboard).fill((), fresh.clone(), seen);
        Ok(fresh)
    }

    pub fn vote_status_or_load<E>(
        &self,
        poll: &PollId,
        voter: &Identity,
        load: impl FnOnce() -> Result<bool, E>,
    ) -> Result<bool, E> {
        let key = (*poll, voter.clone());
        let seen = match lock(&self.vote_status).get(&key) {
            Ok(voted) => return Ok(voted),
            Err(generation) => generation,
        };
        let voted = load()?;
        // "Not voted" can go stale through another process; only cache the final answer.
        if voted {
            lock(&self.vote_status).fill(key, voted, seen);
        }
        Ok(voted)
    }

    pub fn balance_or_load<E>(
        &self,
        owner: &Identity,
        load: impl FnOnce() -> Result<Credits, E>,
    ) -> Result<Credits, E> {
        let seen = match lock(&self.balances).get(owner) {
            Ok(balance) => return Ok(balance),
            Err(generation) => generation,
        };
        let balance = load()?;
        lock(&self.balances).fill(owner.clone(), balance, seen);
        Ok(balance)
    }
}

impl InvalidationSink for ReadModels {
    fn invalidate(&self, message: Invalidation) {
        match &message {
            Invalidation::Leaderboard => lock(&self.leaderboard).invalidate(&()),
            Invalidation::VoteStatus { poll, voter } => {
                lock(&self.vote_status).invalidate(&(*poll, voter.clone()))
            }
            Invalidation::Balance { owner } => lock(&self.balances).invalidate(owner),
            Invalidation::Tallies { .. } | Invalidation::ClaimStatus { .. } => {}
        }
        self.received.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(?message, "read-model invalidated");
        let _ = self.invalidations.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_cache_until_invalidated() {
        let models = ReadModels::new(8);
        let owner = Identity::new("a");
        let first: Result<_, ()> = models.balance_or_load(&owner, || Ok(Credits::new(10)));
        assert_eq!(first, Ok(Credits::new(10)));
        let cached: Result<_, ()> = models.balance_or_load(&owner, || Ok(Credits::new(99)));
        assert_eq!(cached, Ok(Credits::new(10)));

        models.invalidate(Invalidation::Balance { owner: owner.clone() });
        let fresh: Result<_, ()> = models.balance_or_load(&owner, || Ok(Credits::new(99)));
        assert_eq!(fresh, Ok(Credits::new(99)));
        assert_eq!(models.invalidations_received(), 1);
    }

    #[test]
    fn negative_vote_status_is_not_cached() {
        let models = ReadModels::new(8);
        let (poll, voter) = (PollId::new([1; 32]), Identity::new("v"));
        let no: Result<_, ()> = models.vote_status_or_load(&poll, &voter, || Ok(false));
        assert_eq!(no, Ok(false));
        let yes: Result<_, ()> = models.vote_status_or_load(&poll, &voter, || Ok(true));
        assert_eq!(yes, Ok(true));
        let still: Result<_, ()> = models.vote_status_or_load(&poll, &voter, || Ok(false));
        assert_eq!(still, Ok(true));
    }

    #[test]
    fn invalidations_are_rebroadcast() {
        let models = ReadModels::new(8);
        let mut rx = models.subscribe();
        let poll = PollId::new([3; 32]);
        models.invalidate(Invalidation::Tallies { poll });
        assert_eq!(rx.try_recv().unwrap(), Invalidation::Tallies { poll });
    }

    #[test]
    fn invalidation_during_load_is_not_lost() {
        let models = ReadModels::new(8);
        let owner = Identity::new("a");
        let raced: Result<_, ()> = models.balance_or_load(&owner, || {
            models.invalidate(Invalidation::Balance { owner: owner.clone() });
            Ok(Credits::new(1_000))
        });
        assert_eq!(raced, Ok(Credits::new(1_000)));
        let next: Result<_, ()> = models.balance_or_load(&owner, || Ok(Credits::new(991)));
        assert_eq!(next, Ok(Credits::new(991)));
        let cached: Result<_, ()> = models.balance_or_load(&owner, || Ok(Credits::new(5)));
        assert_eq!(cached, Ok(Credits::new(991)));
    }

    #[test]
    fn leaderboard_load_racing_invalidation_is_discarded() {
        let models = ReadModels::new(8);
        let stale = vec![LeaderboardEntry {
            identity: Identity::new("old"),
            effective_reputation: 1,
            multiplier: Multiplier::ONE,
            last_vote: None,
        }];
        let first: Result<_, ()> = models.leaderboard_or_load(|| {
            models.invalidate(Invalidation::Leaderboard);
            Ok(stale.clone())
        });
        assert_eq!(first, Ok(stale));
        let fresh: Result<_, ()> = models.leaderboard_or_load(|| Ok(Vec::new()));
        assert_eq!(fresh, Ok(Vec::new()));
    }
}
