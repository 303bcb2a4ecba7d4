//! Weight-calculation errors.

use qvote_types::{ErrorCategory, Multiplier};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WeightError {
    #[error("credits must be positive")]
    InvalidCredits,

    #[error("credits {credits} exceed the per-vote maximum of {max}")]
    CreditsExceedMax { credits: u128, max: u128 },

    #[error("multiplier {0} is outside [0.3x, 3.0x]")]
    MultiplierOutOfRange(Multiplier),

    #[error("arithmetic overflow in weight computation")]
    Overflow,
}

impl WeightError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCredits | Self::CreditsExceedMax { .. } | Self::MultiplierOutOfRange(_) => {
                ErrorCategory::Validation
            }
            Self::Overflow => ErrorCategory::Internal,
        }
    }
}
