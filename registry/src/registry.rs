//! Poll registry: create, look up, and discover polls.

use crate::error::RegistryError;
use crate::request::PollRequest;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use qvote_ledger::{PollConfig, PollInfo, PollLedger, DEFAULT_EVENT_CAPACITY};
use qvote_types::{PollId, PollLimits, Timestamp};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Default)]
struct Inner {
    polls: HashMap<PollId, Arc<PollLedger>>,
    /// Newest at the back, bounded by `PollLimits::recent_index_capacity`.
    recent: VecDeque<PollId>,
}

/// Every poll this process knows about, keyed by id.
pub struct PollRegistry {
    limits: PollLimits,
    event_capacity: usize,
    inner: RwLock<Inner>,
    sequence: AtomicU64,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self::with_limits(PollLimits::default())
    }

    pub fn with_limits(limits: PollLimits) -> Self {
        Self {
            limits,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            inner: RwLock::new(Inner::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Capacity of each new poll's event channel.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn limits(&self) -> &PollLimits {
        &self.limits
    }

    /// Validate `request`, derive the poll id, and create the poll's ledger.
    pub fn create_poll(
        &self,
        request: PollRequest,
        now: Timestamp,
    ) -> Result<Arc<PollLedger>, RegistryError> {
        request.validate(&self.limits)?;
        let (question, options) = request.normalized();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = derive_poll_id(&request, &question, &options, now, seq)?;

        let config = PollConfig {
            id,
            question,
            options,
            creator: request.creator,
            created_at: now,
            end_time: now.plus_secs(request.duration_secs),
            max_weight_cap: request.max_weight_cap,
            max_credits_per_vote: self.limits.max_credits_per_vote,
        };
        let ledger = Arc::new(PollLedger::with_event_capacity(config, self.event_capacity));

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.polls.insert(id, Arc::clone(&ledger));
        inner.recent.push_back(id);
        while inner.recent.len() > self.limits.recent_index_capacity {
            inner.recent.pop_front();
        }
        let count = inner.polls.len();
        drop(inner);

        tracing::info!(
            poll = %id.short(),
            creator = %ledger.config().creator,
            options = ledger.config().option_count(),
            end_time = ledger.end_time().as_secs(),
            polls = count,
            "poll created"
        );
        Ok(ledger)
    }

    pub fn poll(&self, id: &PollId) -> Result<Arc<PollLedger>, RegistryError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .polls
            .get(id)
            .cloned()
            .ok_or(RegistryError::PollNotFound(*id))
    }

    pub fn contains(&self, id: &PollId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .polls
            .contains_key(id)
    }

    pub fn poll_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .polls
            .len()
    }

    /// Up to `count` most recently created polls, newest first.
    pub fn recent_polls(&self, count: usize) -> Vec<PollId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recent
            .iter()
            .rev()
            .take(count)
            .copied()
            .collect()
    }

    pub fn poll_info(&self, id: &PollId, now: Timestamp) -> Result<PollInfo, RegistryError> {
        Ok(self.poll(id)?.info(now))
    }

    /// All registered ledgers, in no particular order.
    pub fn polls(&self) -> Vec<Arc<PollLedger>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .polls
            .values()
            .cloned()
            .collect()
    }
}

impl Default for PollRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Blake2b-256 over the bincode-encoded creation preimage.
fn derive_poll_id(
    request: &PollRequest,
    question: &str,
    options: &[String],
    created_at: Timestamp,
    seq: u64,
) -> Result<PollId, RegistryError> {
    let preimage = (
        request.creator.as_str(),
        question,
        options,
        created_at.as_secs(),
        seq,
    );
    let bytes = bincode::serialize(&preimage).map_err(|e| RegistryError::Encoding(e.to_string()))?;
    let digest: [u8; 32] = Blake2b::<U32>::digest(&bytes).into();
    Ok(PollId::new(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvote_types::params::DAY_SECS;
    use qvote_types::Identity;

    fn request(question: &str) -> PollRequest {
        PollRequest {
            creator: Identity::new("alice"),
            question: question.into(),
            options: vec!["Yes".into(), "No".into()],
            duration_secs: DAY_SECS,
            max_weight_cap: 5,
        }
    }

    #[test]
    fn create_and_look_up() {
        let registry = PollRegistry::new();
        let ledger = registry.create_poll(request("  Ship it? "), Timestamp::new(100)).unwrap();
        let id = *ledger.id();

        assert_eq!(registry.poll_count(), 1);
        assert!(registry.contains(&id));
        let info = registry.poll_info(&id, Timestamp::new(100)).unwrap();
        assert_eq!(info.question, "Ship it?");
        assert_eq!(info.end_time, Timestamp::new(100 + DAY_SECS));
        assert!(info.is_active);
        assert_eq!(info.max_credits_per_vote, 100);
    }

    #[test]
    fn invalid_request_creates_nothing() {
        let registry = PollRegistry::new();
        let mut r = request("q");
        r.max_weight_cap = 50;
        assert!(registry.create_poll(r, Timestamp::new(0)).is_err());
        assert_eq!(registry.poll_count(), 0);
        assert!(registry.recent_polls(10).is_empty());
    }

    #[test]
    fn identical_requests_get_distinct_ids() {
        let registry = PollRegistry::new();
        let a = registry.create_poll(request("same"), Timestamp::new(5)).unwrap();
        let b = registry.create_poll(request("same"), Timestamp::new(5)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.poll_count(), 2);
    }

    #[test]
    fn unknown_poll_is_not_found() {
        let registry = PollRegistry::new();
        let id = PollId::new([7u8; 32]);
        assert_eq!(registry.poll(&id).err(), Some(RegistryError::PollNotFound(id)));
    }

    #[test]
    fn recent_index_is_bounded_and_newest_first() {
        let limits = PollLimits {
            recent_index_capacity: 3,
            ..PollLimits::default()
        };
        let registry = PollRegistry::with_limits(limits);
        let ids: Vec<PollId> = (0..5)
            .map(|i| *registry.create_poll(request(&format!("q{i}")), Timestamp::new(i)).unwrap().id())
            .collect();

        assert_eq!(registry.poll_count(), 5);
        assert_eq!(registry.recent_polls(10), vec![ids[4], ids[3], ids[2]]);
        assert_eq!(registry.recent_polls(1), vec![ids[4]]);
    }
}
