use qvote_types::{ErrorCategory, Identity, TokenError};
use qvote_weight::WeightError;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid identity {0:?}")]
    InvalidIdentity(String),

    #[error("option {option} out of range (poll has {count} options)")]
    InvalidOption { option: usize, count: usize },

    #[error(transparent)]
    Weight(#[from] WeightError),

    #[error("{0} has already voted in this poll")]
    AlreadyVoted(Identity),

    #[error("poll is closed for voting")]
    PollClosed,

    #[error("poll is still active")]
    PollStillActive,

    #[error("{0} has already claimed")]
    AlreadyClaimed(Identity),

    #[error("nothing to claim: no vote on the winning option")]
    NothingToClaim,

    #[error("escrow failed: {0}")]
    Token(#[from] TokenError),

    #[error("payout of {requested} exceeds remaining pool {remaining}")]
    PoolExhausted { requested: u128, remaining: u128 },

    #[error("arithmetic overflow in ledger accounting")]
    Overflow,
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidIdentity(_) | Self::InvalidOption { .. } => ErrorCategory::Validation,
            Self::Weight(e) => e.category(),
            Self::AlreadyVoted(_)
            | Self::PollClosed
            | Self::PollStillActive
            | Self::AlreadyClaimed(_)
            | Self::NothingToClaim => ErrorCategory::State,
            Self::Token(e) => e.category(),
            Self::PoolExhausted { .. } | Self::Overflow => ErrorCategory::Internal,
        }
    }
}
