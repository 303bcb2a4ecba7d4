//! The stake token: an external collaborator holding voters' credits.

use crate::amount::Credits;
use crate::error::ErrorCategory;
use crate::identity::Identity;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient allowance: need {needed}, granted {granted}")]
    InsufficientAllowance { needed: u128, granted: u128 },

    #[error("arithmetic overflow in token accounting")]
    Overflow,

    #[error("stake token unavailable: {0}")]
    Unavailable(String),
}

impl TokenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InsufficientBalance { .. } | Self::InsufficientAllowance { .. } => {
                ErrorCategory::Resource
            }
            Self::Overflow => ErrorCategory::Internal,
            Self::Unavailable(_) => ErrorCategory::Transport,
        }
    }
}

/// ERC-20-like stake token.
///
/// `spender` is always a poll escrow identity (see [`Identity::escrow`]).
pub trait StakeToken: Send + Sync {
    fn balance_of(&self, owner: &Identity) -> Result<Credits, TokenError>;

    fn allowance(&self, owner: &Identity, spender: &Identity) -> Result<Credits, TokenError>;

    /// Set (not increase) the allowance `owner` grants `spender`.
    fn approve(&self, owner: &Identity, spender: &Identity, amount: Credits)
        -> Result<(), TokenError>;

    /// Move `amount` from `owner` to `spender`, consuming allowance.
    fn transfer_from(
        &self,
        owner: &Identity,
        spender: &Identity,
        amount: Credits,
    ) -> Result<(), TokenError>;

    /// Move `amount` out of `from` (an escrow) to `to`. Used for payouts.
    fn transfer(&self, from: &Identity, to: &Identity, amount: Credits) -> Result<(), TokenError>;
}
