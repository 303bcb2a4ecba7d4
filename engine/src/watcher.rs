//! Live poll views.
//!
//! A [`PollWatcher`] turns a poll into a stream of [`PollNotification`]s. It
//! listens to the gateway's push channel when one exists and re-reads on a
//! fixed interval either way. A failed read never blanks the view: the last
//! good [`PollView`] is kept and reported as stale alongside the error.
//! [`PollNotification::Settled`] is sent once when the poll ends; claims keep
//! streaming after it. The stream ends only if the push channel closes after
//! settlement, or when the caller drops it.

use futures_util::stream::{self, BoxStream};
use qvote_ledger::{LedgerEvent, PollInfo};
use qvote_settlement::{GatewayError, PollGateway};
use qvote_types::{Credits, Identity, PollId, Weight};
use qvote_utils::{retry_read, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Interval, MissedTickBehavior};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollView {
    pub info: PollInfo,
    pub results: Vec<Weight>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollNotification {
    VoteRecorded {
        voter: Identity,
        option: usize,
        weight: Weight,
    },
    Claimed {
        claimant: Identity,
        payout: Credits,
    },
    /// Fresh tallies, emitted whenever they differ from the last view.
    Tallies(PollView),
    /// The poll has ended. Sent once; only claims and refreshes follow.
    Settled {
        winning_option: usize,
        winning_weight: Weight,
    },
    /// A refresh failed. `view` is the last good one, if any.
    Stale {
        view: Option<PollView>,
        error: String,
    },
}

pub struct PollWatcher {
    gateway: Arc<dyn PollGateway>,
    poll: PollId,
    interval: Duration,
    retry: RetryPolicy,
    latest: Arc<Mutex<Option<PollView>>>,
}

impl PollWatcher {
    pub fn new(
        gateway: Arc<dyn PollGateway>,
        poll: PollId,
        interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            poll,
            interval: interval.max(Duration::from_millis(1)),
            retry,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn poll(&self) -> &PollId {
        &self.poll
    }

    /// Last successfully read view.
    pub fn latest(&self) -> Option<PollView> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Start watching. Must be polled inside a Tokio runtime.
    pub fn stream(&self) -> BoxStream<'static, PollNotification> {
        let state = WatchState {
            events: self.gateway.subscribe(&self.poll),
            gateway: Arc::clone(&self.gateway),
            poll: self.poll,
            period: self.interval,
            ticker: None,
            retry: self.retry,
            latest: Arc::clone(&self.latest),
            queue: VecDeque::new(),
            settled: false,
        };
        tracing::debug!(
            poll = %self.poll.short(),
            push = state.events.is_some(),
            interval = ?self.interval,
            "watching poll"
        );

        Box::pin(stream::unfold(state, |mut state| async move {
            let next = state.next().await?;
            Some((next, state))
        }))
    }
}

struct WatchState {
    gateway: Arc<dyn PollGateway>,
    poll: PollId,
    events: Option<broadcast::Receiver<LedgerEvent>>,
    period: Duration,
    ticker: Option<Interval>,
    retry: RetryPolicy,
    latest: Arc<Mutex<Option<PollView>>>,
    queue: VecDeque<PollNotification>,
    settled: bool,
}

enum Wake {
    Event(LedgerEvent),
    Lagged(u64),
    Closed,
    Tick,
}

impl WatchState {
    async fn next(&mut self) -> Option<PollNotification> {
        loop {
            if let Some(note) = self.queue.pop_front() {
                return Some(note);
            }
            match self.wait().await {
                Wake::Event(event) => {
                    self.queue.push_back(notification_for(event));
                    self.refresh().await;
                }
                Wake::Lagged(skipped) => {
                    tracing::debug!(poll = %self.poll.short(), skipped, "watcher lagged, re-reading");
                    self.refresh().await;
                }
                Wake::Closed if self.settled => {
                    tracing::debug!(poll = %self.poll.short(), "push channel closed after settlement");
                    return None;
                }
                Wake::Closed => {
                    tracing::debug!(poll = %self.poll.short(), "push channel closed, polling only");
                    self.events = None;
                }
                Wake::Tick => self.refresh().await,
            }
        }
    }

    async fn wait(&mut self) -> Wake {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        match self.events.as_mut() {
            Some(events) => tokio::select! {
                biased;
                received = events.recv() => match received {
                    Ok(event) => Wake::Event(event),
                    Err(RecvError::Lagged(skipped)) => Wake::Lagged(skipped),
                    Err(RecvError::Closed) => Wake::Closed,
                },
                _ = ticker.tick() => Wake::Tick,
            },
            None => {
                ticker.tick().await;
                Wake::Tick
            }
        }
    }

    async fn refresh(&mut self) {
        let (gateway, poll, retry) = (Arc::clone(&self.gateway), self.poll, self.retry);
        let view = match read_view(&gateway, &poll, retry).await {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(poll = %self.poll.short(), error = %e, "poll refresh failed");
                self.queue.push_back(PollNotification::Stale {
                    view: self.current(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let ended = !view.info.is_active;
        if self.current().as_ref() != Some(&view) {
            *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(view.clone());
            self.queue.push_back(PollNotification::Tallies(view));
        }

        if ended && !self.settled {
            match read(&gateway, &poll, retry, |g, poll| g.winner(poll)).await {
                Ok((winning_option, winning_weight)) => {
                    self.queue.push_back(PollNotification::Settled {
                        winning_option,
                        winning_weight,
                    });
                    self.settled = true;
                }
                Err(e) => self.queue.push_back(PollNotification::Stale {
                    view: self.current(),
                    error: e.to_string(),
                }),
            }
        }
    }

    fn current(&self) -> Option<PollView> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

async fn read_view(
    gateway: &Arc<dyn PollGateway>,
    poll: &PollId,
    retry: RetryPolicy,
) -> Result<PollView, GatewayError> {
    let info = read(gateway, poll, retry, |g, poll| g.poll_info(poll)).await?;
    let results = read(gateway, poll, retry, |g, poll| g.results(poll)).await?;
    Ok(PollView { info, results })
}

async fn read<T>(
    gateway: &Arc<dyn PollGateway>,
    poll: &PollId,
    retry: RetryPolicy,
    op: impl Fn(&dyn PollGateway, &PollId) -> Result<T, GatewayError>,
) -> Result<T, GatewayError> {
    retry_read(retry, || op(gateway.as_ref(), poll), GatewayError::is_retryable).await
}

fn notification_for(event: LedgerEvent) -> PollNotification {
    match event {
        LedgerEvent::VoteRecorded {
            voter,
            option,
            weight,
            ..
        } => PollNotification::VoteRecorded {
            voter,
            option,
            weight,
        },
        LedgerEvent::Claimed {
            claimant, payout, ..
        } => PollNotification::Claimed { claimant, payout },
    }
}
