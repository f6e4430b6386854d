//! AttemptRunner — what a worker does with one work item.

use probe_runtime::Sandbox;
use probe_state::{ProbeStatus, ResultStore, StateUpdate};
use tracing::{error, info, warn};

use crate::error::SchedulerResult;
use crate::pacing::Pacing;
use crate::pool::WorkItem;
use crate::retry::{RetryDecision, RetryScheduler};

/// Runs a single attempt: pace, execute, record, route failures.
pub struct AttemptRunner {
    store: ResultStore,
    sandbox: Sandbox,
    pacing: Pacing,
    retry: RetryScheduler,
}

impl AttemptRunner {
    pub fn new(store: ResultStore, sandbox: Sandbox, pacing: Pacing, retry: RetryScheduler) -> Self {
        Self {
            store,
            sandbox,
            pacing,
            retry,
        }
    }

    /// Run `item` to completion. Errors are logged, never propagated to
    /// the worker.
    pub async fn run(&self, item: WorkItem) {
        let name = item.name().to_string();
        if let Err(e) = self.try_run(item).await {
            error!(probe = %name, error = %e, "attempt could not be recorded");
        }
    }

    async fn try_run(&self, item: WorkItem) -> SchedulerResult<()> {
        let name = item.name();

        self.store
            .merge_update(name, StateUpdate::status(ProbeStatus::Sleeping))?;
        tokio::time::sleep(self.pacing.next_delay()).await;

        self.store
            .merge_update(name, StateUpdate::status(ProbeStatus::Running))?;
        info!(probe = %name, attempt = item.attempt + 1, "running probe");

        let execution = self.sandbox.execute(name, &item.probe.runner).await;
        let duration = execution.duration_secs();

        if execution.is_success() {
            self.store.merge_update(
                name,
                StateUpdate::status(ProbeStatus::Success)
                    .with_error("")
                    .with_duration(duration)
                    .with_retries(item.attempt),
            )?;
            info!(probe = %name, duration_secs = duration, "probe succeeded");
            return Ok(());
        }

        let reason = execution.error_reason();
        self.store.merge_update(
            name,
            StateUpdate::new()
                .with_error(reason.clone())
                .with_duration(duration)
                .with_retries(item.attempt),
        )?;

        let attempt = item.attempt;
        let name = name.to_string();
        match self.retry.on_failure(item)? {
            RetryDecision::RetryAfter { delay, .. } => warn!(
                probe = %name,
                attempt = attempt + 1,
                error = %reason,
                retry_in_secs = delay.as_secs_f64(),
                "probe failed, will retry"
            ),
            RetryDecision::GiveUp => warn!(
                probe = %name,
                retries = attempt,
                error = %reason,
                "probe failed after max retries"
            ),
        }
        Ok(())
    }
}
