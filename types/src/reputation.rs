//! The reputation oracle: an external collaborator consumed read-only.
//!
//! Accrual and decay policy live behind the oracle. The engine reads a fresh
//! snapshot at vote time and never caches it across polls.

use crate::amount::Multiplier;
use crate::error::ErrorCategory;
use crate::identity::Identity;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reputation as seen at vote time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    pub effective_reputation: u128,
    pub multiplier: Multiplier,
}

/// Full per-identity stats, as reported by the oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub effective_reputation: u128,
    pub multiplier: Multiplier,
    /// `None` when the identity has never voted.
    pub last_vote: Option<Timestamp>,
}

impl UserStats {
    pub fn snapshot(&self) -> ReputationSnapshot {
        ReputationSnapshot {
            effective_reputation: self.effective_reputation,
            multiplier: self.multiplier,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("reputation oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned out-of-range multiplier {0}")]
    OutOfRange(Multiplier),
}

impl OracleError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable(_) => ErrorCategory::Transport,
            Self::OutOfRange(_) => ErrorCategory::Validation,
        }
    }
}

/// Read-only reputation source.
pub trait ReputationOracle: Send + Sync {
    fn user_stats(&self, identity: &Identity) -> Result<UserStats, OracleError>;

    /// The identity's current multiplier, guaranteed within `[0.3, 3.0]`.
    fn multiplier(&self, identity: &Identity) -> Result<Multiplier, OracleError> {
        let m = self.user_stats(identity)?.multiplier;
        if !m.in_range() {
            return Err(OracleError::OutOfRange(m));
        }
        Ok(m)
    }

    fn snapshot(&self, identity: &Identity) -> Result<ReputationSnapshot, OracleError> {
        let stats = self.user_stats(identity)?;
        if !stats.multiplier.in_range() {
            return Err(OracleError::OutOfRange(stats.multiplier));
        }
        Ok(stats.snapshot())
    }
}
