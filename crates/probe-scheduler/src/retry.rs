//! Retry policy and the delayed re-submission timer.
//!
//! A failed attempt never sleeps on a worker. The probe is marked
//! `waiting_retry` and handed to a single timer task that owns a
//! `DelayQueue`; when its delay expires the next attempt is pushed back
//! into the worker pool like any other submission.

use std::future::poll_fn;
use std::time::Duration;

use probe_state::{ProbeStatus, ResultStore, StateUpdate};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::time::DelayQueue;
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::pool::{PoolHandle, WorkItem};

/// Retry limits shared by every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts allowed before a probe is given up on.
    pub max_retries: u32,
    /// Wait between a failure and the next attempt.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: Duration::from_secs(60),
        }
    }
}

/// What to do after attempt `attempt` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter { next_attempt: u32, delay: Duration },
    GiveUp,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Attempts are zero-based, so a probe runs at most `max_retries + 1`
    /// times and gives up with `retries == max_retries`.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt < self.max_retries {
            RetryDecision::RetryAfter {
                next_attempt: attempt + 1,
                delay: self.interval,
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// Routes failed attempts to either a delayed retry or a final failure.
#[derive(Clone)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    store: ResultStore,
    timer_tx: mpsc::UnboundedSender<(WorkItem, Duration)>,
}

impl RetryScheduler {
    /// Start the timer task. It runs until `shutdown` flips or every
    /// scheduler handle is dropped and the queue has drained.
    pub fn spawn(
        policy: RetryPolicy,
        store: ResultStore,
        pool: PoolHandle,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_timer(timer_rx, pool, shutdown));
        (
            Self {
                policy,
                store,
                timer_tx,
            },
            task,
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Record the failure of `item` and schedule what comes next.
    ///
    /// The caller has already written the attempt's error, duration and
    /// retry count; this only moves the status.
    pub fn on_failure(&self, item: WorkItem) -> SchedulerResult<RetryDecision> {
        let decision = self.policy.decide(item.attempt);
        match decision {
            RetryDecision::RetryAfter {
                next_attempt,
                delay,
            } => {
                self.store.merge_update(
                    item.name(),
                    StateUpdate::status(ProbeStatus::WaitingRetry),
                )?;
                debug!(
                    probe = %item.name(),
                    next_attempt,
                    delay_secs = delay.as_secs_f64(),
                    "retry scheduled"
                );
                self.timer_tx
                    .send((item.next_attempt(), delay))
                    .map_err(|_| SchedulerError::RetryTimerStopped)?;
            }
            RetryDecision::GiveUp => {
                self.store.merge_update(
                    item.name(),
                    StateUpdate::status(ProbeStatus::FailedMaxRetries),
                )?;
            }
        }
        Ok(decision)
    }
}

async fn run_timer(
    mut incoming: mpsc::UnboundedReceiver<(WorkItem, Duration)>,
    pool: PoolHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut queue: DelayQueue<WorkItem> = DelayQueue::new();
    let mut receiving = true;

    loop {
        if !receiving && queue.is_empty() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(pending = queue.len(), "retry timer stopping");
                    break;
                }
            }
            next = incoming.recv(), if receiving => match next {
                Some((item, delay)) => {
                    queue.insert(item, delay);
                }
                None => receiving = false,
            },
            expired = poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                if let Some(expired) = expired {
                    let item = expired.into_inner();
                    let name = item.name().to_string();
                    if let Err(e) = pool.submit(item) {
                        warn!(probe = %name, error = %e, "dropping retry");
                    }
                }
            }
        }
    }
}
