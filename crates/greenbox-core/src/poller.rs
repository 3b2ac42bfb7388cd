//! Periodic refresh bound to the lifetime of its owner.
//!
//! [`PeriodicSync`] runs `Engine::refresh(Trigger::Periodic)` on a fixed
//! interval in a background task and yields each outcome as a stream. The
//! task stops when the handle is closed or dropped, including mid-cycle.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{Engine, RefreshOutcome};
use crate::sync::Trigger;

/// Outcomes buffered before the oldest unread ones are dropped.
const BUFFER_SIZE: usize = 16;

/// A running periodic refresh.
///
/// The first cycle runs one interval after creation; callers that want data
/// immediately refresh with [`Trigger::Mount`] first.
pub struct PeriodicSync {
    receiver: mpsc::Receiver<RefreshOutcome>,
    handle: tokio::task::JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl PeriodicSync {
    /// Start refreshing `engine` every `period`.
    pub fn new(engine: Engine, period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(BUFFER_SIZE);
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Periodic sync cancelled, stopping");
                        break;
                    }
                    _ = ticks.tick() => {}
                }

                let outcome = tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Periodic sync cancelled mid-cycle, stopping");
                        break;
                    }
                    outcome = engine.refresh(Trigger::Periodic) => outcome,
                };

                match tx.try_send(outcome) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("Periodic sync consumer lagging, dropping outcome");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Periodic sync receiver dropped, stopping");
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            handle,
            cancel_token,
        }
    }

    /// Stop the background task.
    pub fn close(self) {
        self.cancel_token.cancel();
    }

    /// Get a cancellation token that can stop the task externally.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Whether the background task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for PeriodicSync {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl Stream for PeriodicSync {
    type Item = RefreshOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}
