use crate::gateway::TxTicket;
use qvote_ledger::LedgerError;
use qvote_registry::RegistryError;
use qvote_types::{ErrorCategory, OracleError, TokenError};
use std::time::Duration;
use thiserror::Error;

/// Errors a gateway read or write can report.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("unknown transaction {0}")]
    UnknownTicket(TxTicket),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Ledger(e) => e.category(),
            Self::Registry(e) => e.category(),
            Self::Token(e) => e.category(),
            Self::Oracle(e) => e.category(),
            Self::UnknownTicket(_) => ErrorCategory::Internal,
            Self::Unavailable(_) => ErrorCategory::Transport,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{ticket} not confirmed within {waited:?}")]
    ConfirmationTimeout { ticket: TxTicket, waited: Duration },

    #[error("cancelled by user")]
    UserCancelled,

    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("settlement task aborted: {0}")]
    Aborted(String),
}

impl SettlementError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Gateway(e) => e.category(),
            Self::ConfirmationTimeout { .. } => ErrorCategory::Transport,
            Self::UserCancelled => ErrorCategory::UserCancelled,
            Self::IllegalTransition { .. } | Self::Aborted(_) => ErrorCategory::Internal,
        }
    }
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        Self::Gateway(GatewayError::Ledger(e))
    }
}

impl From<TokenError> for SettlementError {
    fn from(e: TokenError) -> Self {
        Self::Gateway(GatewayError::Token(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvote_types::Identity;

    #[test]
    fn categories_follow_the_source() {
        let e: SettlementError = LedgerError::AlreadyVoted(Identity::new("a")).into();
        assert_eq!(e.category(), ErrorCategory::State);

        let e: SettlementError = TokenError::InsufficientBalance { needed: 5, available: 1 }.into();
        assert_eq!(e.category(), ErrorCategory::Resource);

        let e = SettlementError::ConfirmationTimeout {
            ticket: TxTicket::new(1),
            waited: Duration::from_secs(1),
        };
        assert_eq!(e.category(), ErrorCategory::Transport);
        assert_eq!(SettlementError::UserCancelled.category(), ErrorCategory::UserCancelled);
        assert!(GatewayError::Unavailable("rpc".into()).is_retryable());
        assert!(!GatewayError::Ledger(LedgerError::PollClosed).is_retryable());
    }
}
