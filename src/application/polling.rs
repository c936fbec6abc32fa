//! Client-side polling protocol.
//!
//! Neither party is notified of changes; both re-read on a fixed interval and
//! stop on the first of: target reached, deadline passed, read error, or local
//! cancellation. Observations may be stale by up to one interval. Cancelling
//! only stops further requests and never touches server state.

use crate::application::engine::TransactionEngine;
use crate::domain::transaction::{TransactionId, TransactionSnapshot, TransactionStatus};
use crate::error::{PaymentError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Shortest interval a poller will use; shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Statuses a client waits for after creating a transaction.
pub const CLIENT_TARGETS: &[TransactionStatus] = &[
    TransactionStatus::ReadyForAuth,
    TransactionStatus::Authorized,
    TransactionStatus::Settled,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Polling stops once this instant has passed.
    pub deadline: Option<Instant>,
}

impl PollPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            deadline: None,
        }
    }

    /// Stops polling `ttl` from now, e.g. when the token or record expires.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.deadline = Some(Instant::now() + ttl);
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Why a polling loop stopped.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Reached(T),
    Expired,
    Failed(PaymentError),
    Cancelled,
}

impl<T> PollOutcome<T> {
    pub fn reached(self) -> Option<T> {
        match self {
            PollOutcome::Reached(value) => Some(value),
            _ => None,
        }
    }
}

/// Sender half used to stop a polling loop.
#[derive(Debug)]
pub struct PollCanceller(watch::Sender<bool>);

impl PollCanceller {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiver half handed to the polling loop.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender leaves the receiver at `false` forever.
        drop(tx);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancellation() -> (PollCanceller, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (PollCanceller(tx), CancelSignal(rx))
}

/// Calls `fetch` every `policy.interval` until `done` accepts a result.
///
/// The first fetch happens immediately. Errors are never retried.
pub async fn poll_until<T, F, Fut, D>(
    policy: PollPolicy,
    mut cancel: CancelSignal,
    mut fetch: F,
    mut done: D,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    D: FnMut(&T) -> bool,
{
    let mut ticker = tokio::time::interval(policy.interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = ticker.tick() => {}
        }
        if policy.expired() {
            tracing::debug!("polling deadline reached");
            return PollOutcome::Expired;
        }
        match fetch().await {
            Ok(value) if done(&value) => return PollOutcome::Reached(value),
            Ok(_) => tracing::debug!("poll tick: target not reached"),
            Err(e) => {
                tracing::debug!(error = %e, "poll failed; stopping");
                return PollOutcome::Failed(e);
            }
        }
    }
}

/// Polls one transaction until its status is in `targets` or terminal.
pub async fn watch_transaction(
    engine: &TransactionEngine,
    id: &TransactionId,
    token: &str,
    targets: &[TransactionStatus],
    policy: PollPolicy,
    cancel: CancelSignal,
) -> PollOutcome<TransactionSnapshot> {
    poll_until(
        policy,
        cancel,
        || engine.status(id, token),
        |snapshot| {
            let status = snapshot.transaction.status;
            status.is_terminal() || targets.contains(&status)
        },
    )
    .await
}

/// POS side: polls the list for `status` until it is non-empty.
pub async fn watch_queue(
    engine: &TransactionEngine,
    status: TransactionStatus,
    token: &str,
    policy: PollPolicy,
    cancel: CancelSignal,
) -> PollOutcome<Vec<TransactionSnapshot>> {
    poll_until(
        policy,
        cancel,
        || engine.list_by_status(status, token),
        |list| !list.is_empty(),
    )
    .await
}
