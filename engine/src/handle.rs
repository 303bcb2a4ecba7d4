use qvote_settlement::{FlowOutcome, SettlementError};
use tokio::task::JoinHandle;

/// A command running in the background.
///
/// Dropping the handle does not cancel the command; the flow runs to its
/// outcome either way and the engine records it.
pub struct SubmissionHandle<T> {
    task: JoinHandle<FlowOutcome<T>>,
}

impl<T> SubmissionHandle<T> {
    pub(crate) fn new(task: JoinHandle<FlowOutcome<T>>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the command to finish.
    pub async fn outcome(self) -> FlowOutcome<T> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => FlowOutcome::Failed(SettlementError::Aborted(e.to_string())),
        }
    }
}
