use crate::error::SettlementError;
use qvote_types::ErrorCategory;

/// How a submitted command ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome<T> {
    Confirmed(T),
    /// Refused by the user or the ledger; retrying the same request cannot help.
    Rejected(SettlementError),
    /// Transport or internal failure; the write may or may not have landed.
    Failed(SettlementError),
}

impl<T> FlowOutcome<T> {
    pub fn from_result(result: Result<T, SettlementError>) -> Self {
        match result {
            Ok(value) => Self::Confirmed(value),
            Err(e) if is_rejection(&e) => Self::Rejected(e),
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    pub fn error(&self) -> Option<&SettlementError> {
        match self {
            Self::Confirmed(_) => None,
            Self::Rejected(e) | Self::Failed(e) => Some(e),
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.error().map(SettlementError::category)
    }
}

/// Whether `e` ends a flow in `Rejected` rather than `Failed`.
pub(crate) fn is_rejection(e: &SettlementError) -> bool {
    matches!(
        e.category(),
        ErrorCategory::Validation
            | ErrorCategory::State
            | ErrorCategory::Resource
            | ErrorCategory::UserCancelled
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TxTicket;
    use qvote_ledger::LedgerError;
    use std::time::Duration;

    #[test]
    fn classifies_by_category() {
        let ok: FlowOutcome<u8> = FlowOutcome::from_result(Ok(1));
        assert!(ok.is_confirmed());

        let cancelled: FlowOutcome<u8> = FlowOutcome::from_result(Err(SettlementError::UserCancelled));
        assert!(matches!(cancelled, FlowOutcome::Rejected(_)));

        let closed: FlowOutcome<u8> = FlowOutcome::from_result(Err(LedgerError::PollClosed.into()));
        assert!(matches!(closed, FlowOutcome::Rejected(_)));

        let timeout: FlowOutcome<u8> = FlowOutcome::from_result(Err(SettlementError::ConfirmationTimeout {
            ticket: TxTicket::new(3),
            waited: Duration::from_millis(10),
        }));
        assert!(matches!(timeout, FlowOutcome::Failed(_)));
        assert_eq!(timeout.category(), Some(ErrorCategory::Transport));
    }
}
