//! Orchestrator — wires the pool, retry timer, submitter and monitor
//! together for one run over a catalog.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use probe_core::{ConfigError, HarnessConfig, Probe};
use probe_monitor::{MonitorExit, ProgressMonitor, StatusCounts};
use probe_runtime::{BoxFuture, ProbeBinder, Sandbox};
use probe_state::{ProbeStatus, ResultStore, StateUpdate};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::attempt::AttemptRunner;
use crate::error::{SchedulerError, SchedulerResult};
use crate::pacing::Pacing;
use crate::pool::{BoundProbe, PoolHandle, WorkHandler, WorkItem, WorkerPool};
use crate::retry::{RetryPolicy, RetryScheduler};

/// Tunables for a run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub concurrency: usize,
    /// Pause between initial submissions.
    pub submit_delay: Duration,
    pub pacing: Pacing,
    pub retry: RetryPolicy,
    pub monitor_interval: Duration,
    pub results_path: PathBuf,
    /// Print the progress line to stdout.
    pub render_progress: bool,
}

impl OrchestratorConfig {
    /// Defaults matching `HarnessConfig::default()`, writing to `results_path`.
    pub fn new(results_path: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: 8,
            submit_delay: Duration::from_millis(500),
            pacing: Pacing::default(),
            retry: RetryPolicy::default(),
            monitor_interval: Duration::from_secs(5),
            results_path: results_path.into(),
            render_progress: false,
        }
    }

    pub fn from_harness(config: &HarnessConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            concurrency: config.pool.concurrency,
            submit_delay: config.pool.submit_delay()?,
            pacing: Pacing::new(config.pool.pacing_min()?, config.pool.pacing_max()?),
            retry: RetryPolicy::new(config.retry.max_retries, config.retry.interval()?),
            monitor_interval: config.monitor.interval()?,
            results_path: config.results.path.clone(),
            render_progress: false,
        })
    }
}

/// Outcome of [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub exit: MonitorExit,
    /// Probes initialized as runnable this run.
    pub scheduled: usize,
    /// Probes initialized as `skipped_no_example` this run.
    pub skipped: usize,
    /// Work items accepted by the pool, retries included.
    pub submitted: u64,
    pub counts: StatusCounts,
}

/// Result of [`Orchestrator::prepare`].
#[derive(Debug, Default)]
pub struct Prepared {
    /// Probes to submit, in catalog order.
    pub runnable: Vec<Arc<BoundProbe>>,
    /// Probes with nothing to run.
    pub skipped: usize,
    /// Probes already terminal from a previous run.
    pub finished: usize,
}

/// Runs a set of probes to completion against a shared [`ResultStore`].
pub struct Orchestrator {
    config: OrchestratorConfig,
    store: ResultStore,
    sandbox: Sandbox,
    binder: Arc<dyn ProbeBinder>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: ResultStore,
        sandbox: Sandbox,
        binder: Arc<dyn ProbeBinder>,
    ) -> Self {
        Self {
            config,
            store,
            sandbox,
            binder,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Initialize records for `probes` and return the ones to submit.
    ///
    /// Probes already terminal in the store are left untouched. Everything
    /// else is reset to `pending` (or `skipped_no_example` when nothing can
    /// be bound) with `retries = 0`. Unfinished records for names outside
    /// the catalog are kept as they are but no longer hold the run open.
    pub fn prepare(&self, probes: &[Probe]) -> SchedulerResult<Prepared> {
        let mut seen = HashSet::new();
        let mut prepared = Prepared::default();

        for probe in probes {
            if !seen.insert(probe.name.as_str()) {
                warn!(probe = %probe.name, "duplicate catalog entry ignored");
                continue;
            }

            if let Some(previous) = self.store.get(&probe.name) {
                if previous.status.is_terminal() {
                    prepared.finished += 1;
                    debug!(probe = %probe.name, status = %previous.status, "already finished, skipping");
                    continue;
                }
            }

            let runner = probe
                .snippet
                .as_deref()
                .and_then(|snippet| self.binder.bind(&probe.name, snippet));

            match runner {
                Some(runner) => {
                    self.store.merge_update(
                        &probe.name,
                        StateUpdate::status(ProbeStatus::Pending).with_retries(0),
                    )?;
                    prepared.runnable.push(BoundProbe::new(probe.name.clone(), runner));
                }
                None => {
                    self.store.merge_update(
                        &probe.name,
                        StateUpdate::status(ProbeStatus::SkippedNoExample).with_retries(0),
                    )?;
                    prepared.skipped += 1;
                    debug!(probe = %probe.name, "no runnable example");
                }
            }
        }

        let detached = self.store.detach_active(|name| seen.contains(name));
        if !detached.is_empty() {
            warn!(
                count = detached.len(),
                "unfinished records outside the catalog will not be run"
            );
        }

        Ok(prepared)
    }

    /// Run every probe until all are terminal or `shutdown` resolves.
    ///
    /// On shutdown the pool stops taking work, the retry timer stops and
    /// the monitor writes a final snapshot; in-flight attempts are not
    /// waited for. Fails if no snapshot could ever be written.
    pub async fn run<F>(self, probes: Vec<Probe>, shutdown: F) -> SchedulerResult<RunSummary>
    where
        F: Future<Output = ()> + Send,
    {
        let Prepared {
            runnable,
            skipped,
            finished,
        } = self.prepare(&probes)?;
        let scheduled = runnable.len();
        info!(
            total = probes.len(),
            scheduled,
            skipped,
            finished,
            concurrency = self.config.concurrency,
            "starting probe run"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        let pool = WorkerPool::new(self.config.concurrency);
        let handle = pool.handle();

        let (retry, retry_task) = RetryScheduler::spawn(
            self.config.retry,
            self.store.clone(),
            handle.clone(),
            shutdown_rx.clone(),
        );
        let runner = Arc::new(AttemptRunner::new(
            self.store.clone(),
            self.sandbox.clone(),
            self.config.pacing,
            retry,
        ));
        let handler: WorkHandler = Arc::new(move |item: WorkItem| -> BoxFuture<()> {
            let runner = Arc::clone(&runner);
            Box::pin(async move { runner.run(item).await })
        });
        let workers = pool.start(handler);

        let submitter = tokio::spawn(submit_all(
            runnable,
            handle.clone(),
            self.config.submit_delay,
            done_tx,
        ));

        let monitor = ProgressMonitor::new(
            self.store.clone(),
            self.config.results_path.clone(),
            self.config.monitor_interval,
        )
        .with_render(self.config.render_progress);
        let mut monitor_task = tokio::spawn(monitor.run(done_rx, shutdown_rx));

        tokio::pin!(shutdown);
        let joined = tokio::select! {
            report = &mut monitor_task => report,
            _ = &mut shutdown => {
                info!("shutdown requested, stopping run");
                handle.close();
                shutdown_tx.send_replace(true);
                (&mut monitor_task).await
            }
        };
        let report = joined.map_err(|e| SchedulerError::Task(e.to_string()))?;

        handle.close();
        shutdown_tx.send_replace(true);
        match report.exit {
            MonitorExit::Completed => {
                // Everything is terminal, so the workers are idle.
                for worker in workers {
                    let _ = worker.await;
                }
                let _ = retry_task.await;
                let _ = submitter.await;
            }
            MonitorExit::Interrupted => submitter.abort(),
        }

        if !report.persisted() {
            return Err(SchedulerError::ResultsUnwritable(
                self.config.results_path.clone(),
            ));
        }

        let summary = RunSummary {
            exit: report.exit,
            scheduled,
            skipped,
            submitted: handle.submitted(),
            counts: report.counts,
        };
        info!(
            exit = ?summary.exit,
            submitted = summary.submitted,
            "probe run finished: {}",
            summary.counts
        );
        Ok(summary)
    }
}

/// Feed the first attempt of every probe into the pool, paced by `delay`.
async fn submit_all(
    probes: Vec<Arc<BoundProbe>>,
    pool: PoolHandle,
    delay: Duration,
    done: watch::Sender<bool>,
) {
    let total = probes.len();
    for (i, probe) in probes.into_iter().enumerate() {
        if let Err(e) = pool.submit(WorkItem::first(probe)) {
            debug!(error = %e, "submission stopped");
            break;
        }
        if i + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    debug!(total, "submission pass finished");
    done.send_replace(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_runtime::{RegistryBinder, probe_fn};
    use probe_state::ProbeState;

    fn orchestrator(store: &ResultStore) -> Orchestrator {
        let binder = RegistryBinder::new()
            .register("getA", probe_fn(|_ctx| async { Ok(()) }))
            .register("getB", probe_fn(|_ctx| async { Ok(()) }));
        Orchestrator::new(
            OrchestratorConfig::new("results.json"),
            store.clone(),
            Sandbox::new(Duration::from_secs(30)),
            Arc::new(binder),
        )
    }

    #[test]
    fn config_from_harness_defaults() {
        let config = OrchestratorConfig::from_harness(&HarnessConfig::default()).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.submit_delay, Duration::from_millis(500));
        assert_eq!(config.pacing, Pacing::default());
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.monitor_interval, Duration::from_secs(5));
        assert_eq!(config.results_path, PathBuf::from("api_test_results.json"));
    }

    #[test]
    fn config_rejects_bad_durations() {
        let mut harness = HarnessConfig::default();
        harness.retry.interval = "soon".into();
        assert!(OrchestratorConfig::from_harness(&harness).is_err());
    }

    #[test]
    fn prepare_initializes_and_skips() {
        let store = ResultStore::new();
        store
            .merge_update(
                "getB",
                StateUpdate::status(ProbeStatus::Pending).with_retries(2),
            )
            .unwrap();
        store
            .merge_update("done", StateUpdate::status(ProbeStatus::SkippedNoExample))
            .unwrap();

        let prepared = orchestrator(&store)
            .prepare(&[
                Probe::new("getA", Some("x".into())),
                Probe::new("getB", Some("x".into())),
                Probe::new("getA", Some("x".into())),
                Probe::new("noSnippet", None),
                Probe::new("unbound", Some("x".into())),
                Probe::new("done", None),
            ])
            .unwrap();

        let names: Vec<_> = prepared.runnable.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["getA", "getB"]);
        assert_eq!(prepared.skipped, 2);
        assert_eq!(prepared.finished, 1);

        assert_eq!(store.get("getB").unwrap().retries, 0);
        assert_eq!(
            store.get("noSnippet").unwrap(),
            ProbeState {
                status: ProbeStatus::SkippedNoExample,
                last_run: store.get("noSnippet").unwrap().last_run,
                ..ProbeState::default()
            }
        );
        assert_eq!(store.get("unbound").unwrap().status, ProbeStatus::SkippedNoExample);
    }

    #[test]
    fn prepare_detaches_unfinished_records_outside_the_catalog() {
        let store = ResultStore::new();
        store
            .merge_update("retired", StateUpdate::status(ProbeStatus::Pending))
            .unwrap();

        let prepared = orchestrator(&store)
            .prepare(&[Probe::new("getA", Some("x".into()))])
            .unwrap();

        assert_eq!(prepared.runnable.len(), 1);
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.get("retired").unwrap().status, ProbeStatus::Pending);
    }
}
