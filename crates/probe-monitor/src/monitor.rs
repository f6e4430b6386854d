//! Progress monitor — background loop that persists and reports run state.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use probe_state::ResultStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::progress::StatusCounts;

/// Why the monitor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Every probe is terminal and the submission pass finished.
    Completed,
    /// A shutdown was requested.
    Interrupted,
}

/// Summary returned by [`ProgressMonitor::run`].
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub exit: MonitorExit,
    pub counts: StatusCounts,
    pub saves_ok: u64,
    pub saves_failed: u64,
}

impl MonitorReport {
    /// True if at least one snapshot reached disk during the run.
    pub fn persisted(&self) -> bool {
        self.saves_ok > 0
    }
}

/// Periodically snapshots the result store to disk and renders progress.
pub struct ProgressMonitor {
    store: ResultStore,
    results_path: PathBuf,
    interval: Duration,
    render: bool,
    saves_ok: u64,
    saves_failed: u64,
}

impl ProgressMonitor {
    pub fn new(store: ResultStore, results_path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            store,
            results_path: results_path.into(),
            interval,
            render: false,
            saves_ok: 0,
            saves_failed: 0,
        }
    }

    /// Print the single-line progress summary to stdout on every tick.
    pub fn with_render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// Snapshot, persist, count and render once.
    pub fn tick(&mut self) -> StatusCounts {
        let snapshot = self.store.snapshot();
        match snapshot.write(&self.results_path) {
            Ok(()) => self.saves_ok += 1,
            Err(e) => {
                self.saves_failed += 1;
                warn!(path = ?self.results_path, error = %e, "failed to save results");
            }
        }

        let counts = StatusCounts::from_snapshot(&snapshot);
        if self.render {
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "\r{}   ", counts.render_line());
            let _ = out.flush();
        }
        debug!(active = counts.active(), total = counts.total(), "progress tick");
        counts
    }

    /// Run until completion or shutdown.
    ///
    /// Completion requires both an active count of zero and
    /// `submission_done` set, so probes still being enqueued are never
    /// mistaken for a finished run.
    pub async fn run(
        mut self,
        mut submission_done: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) -> MonitorReport {
        let mut active = self.store.watch_active();
        let mut watching_active = true;
        let mut watching_submission = true;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;

        info!(interval_ms = self.interval.as_millis() as u64, "progress monitor started");

        loop {
            if *shutdown.borrow() {
                return self.finish(MonitorExit::Interrupted);
            }
            if *active.borrow() == 0 && *submission_done.borrow() {
                return self.finish(MonitorExit::Completed);
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                changed = active.changed(), if watching_active => {
                    watching_active = changed.is_ok();
                }
                changed = submission_done.changed(), if watching_submission => {
                    watching_submission = changed.is_ok();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        return self.finish(MonitorExit::Interrupted);
                    }
                }
            }
        }
    }

    fn finish(mut self, exit: MonitorExit) -> MonitorReport {
        let counts = self.tick();
        if self.render {
            println!();
        }
        match exit {
            MonitorExit::Completed => info!(
                success = counts.get(probe_state::ProbeStatus::Success),
                failed = counts.get(probe_state::ProbeStatus::FailedMaxRetries),
                skipped = counts.get(probe_state::ProbeStatus::SkippedNoExample),
                "all probes completed"
            ),
            MonitorExit::Interrupted => {
                info!(active = counts.active(), "monitor stopped, results saved")
            }
        }
        MonitorReport {
            exit,
            counts,
            saves_ok: self.saves_ok,
            saves_failed: self.saves_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_state::{ProbeStatus, ResultSnapshot, StateUpdate};

    fn monitor(store: &ResultStore, dir: &tempfile::TempDir) -> ProgressMonitor {
        ProgressMonitor::new(
            store.clone(),
            dir.path().join("results.json"),
            Duration::from_secs(5),
        )
    }

    fn advance(store: &ResultStore, name: &str, path: &[ProbeStatus]) {
        for status in path {
            store.merge_update(name, StateUpdate::status(*status)).unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_last_probe_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new();
        store.merge_update("a", StateUpdate::status(ProbeStatus::Pending)).unwrap();

        let (done_tx, done_rx) = watch::channel(true);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor(&store, &dir).run(done_rx, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!handle.is_finished());

        advance(
            &store,
            "a",
            &[ProbeStatus::Sleeping, ProbeStatus::Running, ProbeStatus::Success],
        );
        let report = handle.await.unwrap();
        drop(done_tx);

        assert_eq!(report.exit, MonitorExit::Completed);
        assert_eq!(report.counts.get(ProbeStatus::Success), 1);
        assert!(report.saves_ok >= 3);

        let saved = ResultSnapshot::read(&dir.path().join("results.json")).unwrap();
        assert_eq!(saved.get("a").unwrap().status, ProbeStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_submission_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new();

        let (done_tx, done_rx) = watch::channel(false);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor(&store, &dir).run(done_rx, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!handle.is_finished(), "nothing active yet, but submission still open");

        done_tx.send(true).unwrap();
        let report = handle.await.unwrap();
        assert_eq!(report.exit, MonitorExit::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_saves_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new();
        store.merge_update("a", StateUpdate::status(ProbeStatus::Pending)).unwrap();

        let (_done_tx, done_rx) = watch::channel(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor(&store, &dir).run(done_rx, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.exit, MonitorExit::Interrupted);
        assert!(report.persisted());
        let saved = ResultSnapshot::read(&dir.path().join("results.json")).unwrap();
        assert_eq!(saved.get("a").unwrap().status, ProbeStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn save_failures_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the results file should be makes every save fail.
        let blocked = dir.path().join("results.json");
        std::fs::create_dir(&blocked).unwrap();

        let store = ResultStore::new();
        store.merge_update("a", StateUpdate::status(ProbeStatus::Pending)).unwrap();

        let (_done_tx, done_rx) = watch::channel(true);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = ProgressMonitor::new(store.clone(), blocked, Duration::from_secs(5));
        let handle = tokio::spawn(monitor.run(done_rx, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(16)).await;
        advance(
            &store,
            "a",
            &[ProbeStatus::Sleeping, ProbeStatus::Running, ProbeStatus::Success],
        );
        let report = handle.await.unwrap();

        assert_eq!(report.exit, MonitorExit::Completed);
        assert!(report.saves_failed >= 3);
        assert!(!report.persisted());
    }
}
