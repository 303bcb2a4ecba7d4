//! Error categories shared across crates.
//!
//! Every crate defines its own error enum; each one maps its variants onto
//! one of these categories so callers can act on a failure without matching
//! every concrete variant.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The request itself is malformed (bad credits, option, parameters).
    Validation,
    /// The request conflicts with ledger state (already voted, poll closed, ...).
    State,
    /// The caller lacks funds or allowance.
    Resource,
    /// Confirmation wait timed out or a read failed transiently.
    Transport,
    /// The user declined a required step.
    UserCancelled,
    /// Arithmetic overflow or a bug-level inconsistency.
    Internal,
}

impl ErrorCategory {
    /// Whether a later retry of the same request could succeed without the
    /// caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::State => "state",
            Self::Resource => "resource",
            Self::Transport => "transport",
            Self::UserCancelled => "user-cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}
