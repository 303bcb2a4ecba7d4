//! Nullable reputation oracle.

use qvote_types::{Identity, Multiplier, OracleError, ReputationOracle, Timestamp, UserStats};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Unknown identities get zero reputation and a 1.0x multiplier.
#[derive(Default)]
pub struct NullOracle {
    stats: Mutex<HashMap<Identity, UserStats>>,
    unavailable: AtomicBool,
}

impl NullOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stats(&self, identity: &Identity, stats: UserStats) {
        self.stats.lock().unwrap().insert(identity.clone(), stats);
    }

    /// Set the multiplier, keeping any other stats. Out-of-range values are
    /// stored as given so callers can exercise the oracle's range check.
    pub fn set_multiplier(&self, identity: &Identity, multiplier: Multiplier) {
        self.stats
            .lock()
            .unwrap()
            .entry(identity.clone())
            .or_insert_with(default_stats)
            .multiplier = multiplier;
    }

    pub fn set_reputation(&self, identity: &Identity, effective_reputation: u128) {
        self.stats
            .lock()
            .unwrap()
            .entry(identity.clone())
            .or_insert_with(default_stats)
            .effective_reputation = effective_reputation;
    }

    pub fn record_vote(&self, identity: &Identity, at: Timestamp) {
        self.stats
            .lock()
            .unwrap()
            .entry(identity.clone())
            .or_insert_with(default_stats)
            .last_vote = Some(at);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

fn default_stats() -> UserStats {
    UserStats {
        effective_reputation: 0,
        multiplier: Multiplier::ONE,
        last_vote: None,
    }
}

impl ReputationOracle for NullOracle {
    fn user_stats(&self, identity: &Identity) -> Result<UserStats, OracleError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("null oracle switched off".into()));
        }
        Ok(self
            .stats
            .lock()
            .unwrap()
            .get(identity)
            .copied()
            .unwrap_or_else(default_stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let oracle = NullOracle::new();
        let a = Identity::new("a");
        assert_eq!(oracle.multiplier(&a), Ok(Multiplier::ONE));

        oracle.set_multiplier(&a, Multiplier::from_tenths(25));
        oracle.set_reputation(&a, 700);
        let stats = oracle.user_stats(&a).unwrap();
        assert_eq!(stats.multiplier, Multiplier::from_tenths(25));
        assert_eq!(stats.effective_reputation, 700);
        assert_eq!(stats.last_vote, None);
    }

    #[test]
    fn out_of_range_multiplier_is_rejected_by_the_trait() {
        let oracle = NullOracle::new();
        let a = Identity::new("a");
        oracle.set_multiplier(&a, Multiplier::from_tenths(31));
        assert!(matches!(oracle.multiplier(&a), Err(OracleError::OutOfRange(_))));
    }
}
