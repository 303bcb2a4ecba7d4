//! Waiting for a submitted write to become final.

use crate::error::{GatewayError, SettlementError};
use crate::gateway::{PollGateway, TxStatus, TxTicket};
use crate::settings::FlowSettings;
use qvote_utils::{retry_read, RetryPolicy};
use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `ticket` every `confirmation_interval` until it is final or
/// `confirmation_timeout` elapses. Transient status-read failures are
/// swallowed and polled again; the timeout still bounds the wait.
pub async fn await_confirmation<G>(
    gateway: &G,
    ticket: TxTicket,
    settings: &FlowSettings,
) -> Result<(), SettlementError>
where
    G: PollGateway + ?Sized,
{
    let poll_status = async {
        let mut ticker = tokio::time::interval(settings.confirmation_interval.max(MIN_INTERVAL));
        loop {
            ticker.tick().await;
            match gateway.tx_status(ticket) {
                Ok(TxStatus::Pending) => {}
                Ok(TxStatus::Confirmed) => return Ok(()),
                Ok(TxStatus::Reverted(reason)) => return Err(SettlementError::Gateway(reason)),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(%ticket, error = %e, "status read failed, polling again");
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    match tokio::time::timeout(settings.confirmation_timeout, poll_status).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%ticket, timeout = ?settings.confirmation_timeout, "confirmation timed out");
            Err(SettlementError::ConfirmationTimeout {
                ticket,
                waited: settings.confirmation_timeout,
            })
        }
    }
}

/// A gateway read under the flow's retry policy.
pub(crate) async fn read<T, F>(policy: RetryPolicy, op: F) -> Result<T, SettlementError>
where
    F: FnMut() -> Result<T, GatewayError>,
{
    retry_read(policy, op, GatewayError::is_retryable)
        .await
        .map_err(SettlementError::from)
}

/// A write whose outcome the flow could not observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    Approval(TxTicket),
    /// `None` when the submission itself failed in transit.
    Vote(Option<TxTicket>),
    Claim(Option<TxTicket>),
}
