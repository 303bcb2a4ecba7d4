//! Settlement flow states and their legal transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteFlowState {
    Idle,
    /// Reading poll, vote, balance, and allowance before any write.
    AllowanceCheck,
    NeedsApproval,
    ApprovalPending,
    ApprovalConfirmed,
    VotePending,
    VoteConfirmed,
    /// Read-models have been told. Terminal.
    Settled,
    /// Refused: user cancelled, or the ledger declined. Terminal.
    Rejected,
    /// Transport or internal failure. May be retried.
    Failed,
}

impl VoteFlowState {
    pub fn can_transition_to(self, next: Self) -> bool {
        use VoteFlowState::*;
        matches!(
            (self, next),
            (Idle, AllowanceCheck)
                | (AllowanceCheck, VotePending | NeedsApproval | VoteConfirmed)
                | (NeedsApproval, ApprovalPending)
                | (ApprovalPending, ApprovalConfirmed)
                | (ApprovalConfirmed, VotePending)
                | (VotePending, VoteConfirmed)
                | (VoteConfirmed, Settled)
                | (Failed, Idle)
                | (
                    AllowanceCheck | NeedsApproval | ApprovalPending | ApprovalConfirmed | VotePending,
                    Rejected | Failed
                )
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Rejected)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::ApprovalPending | Self::VotePending)
    }
}

impl fmt::Display for VoteFlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimFlowState {
    Idle,
    ClaimPending,
    ClaimConfirmed,
    Settled,
    Rejected,
    Failed,
}

impl ClaimFlowState {
    pub fn can_transition_to(self, next: Self) -> bool {
        use ClaimFlowState::*;
        matches!(
            (self, next),
            (Idle, ClaimPending | ClaimConfirmed | Rejected | Failed)
                | (ClaimPending, ClaimConfirmed | Rejected | Failed)
                | (ClaimConfirmed, Settled)
                | (Failed, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Rejected)
    }
}

impl fmt::Display for ClaimFlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One recorded step in a flow's history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
}

#[cfg(test)]
mod tests {
    use super::*;
    use VoteFlowState::*;

    #[test]
    fn happy_paths_are_legal() {
        let direct = [Idle, AllowanceCheck, VotePending, VoteConfirmed, Settled];
        let approved = [
            Idle,
            AllowanceCheck,
            NeedsApproval,
            ApprovalPending,
            ApprovalConfirmed,
            VotePending,
            VoteConfirmed,
            Settled,
        ];
        for path in [&direct[..], &approved[..]] {
            for pair in path.windows(2) {
                assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn error_states_reachable_from_pending_only() {
        for s in [AllowanceCheck, NeedsApproval, ApprovalPending, ApprovalConfirmed, VotePending] {
            assert!(s.can_transition_to(Rejected));
            assert!(s.can_transition_to(Failed));
        }
        for s in [Idle, VoteConfirmed, Settled, Rejected] {
            assert!(!s.can_transition_to(Failed));
        }
    }

    #[test]
    fn terminal_states_stay_put() {
        for next in [Idle, AllowanceCheck, VotePending, Failed] {
            assert!(!Settled.can_transition_to(next));
            assert!(!Rejected.can_transition_to(next));
        }
        assert!(Failed.can_transition_to(Idle));
        assert!(!Idle.can_transition_to(VotePending));
    }

    #[test]
    fn claim_transitions() {
        use ClaimFlowState as C;
        assert!(C::Idle.can_transition_to(C::ClaimPending));
        assert!(C::ClaimPending.can_transition_to(C::ClaimConfirmed));
        assert!(C::ClaimConfirmed.can_transition_to(C::Settled));
        assert!(C::Idle.can_transition_to(C::ClaimConfirmed));
        assert!(!C::Settled.can_transition_to(C::ClaimPending));
        assert!(!C::ClaimConfirmed.can_transition_to(C::Failed));
    }
}
