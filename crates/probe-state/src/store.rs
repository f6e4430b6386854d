//! ResultStore — lock-guarded per-probe state shared across tasks.
//!
//! Every mutation goes through [`ResultStore::merge_update`], which takes
//! the single store mutex, validates the status transition, applies the
//! update and republishes the number of active probes. The mutex is a
//! blocking `std::sync::Mutex` and is never held across an `.await`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{StateError, StateResult};
use crate::snapshot::ResultSnapshot;
use crate::types::*;

struct Records {
    probes: BTreeMap<String, ProbeState>,
    /// Number of tracked records in a non-terminal status.
    active: usize,
    /// Non-terminal records kept as data but left out of `active`.
    detached: HashSet<String>,
    /// Undecodable records from the loaded file, saved back untouched.
    unparsed: BTreeMap<String, Value>,
}

struct Inner {
    records: Mutex<Records>,
    active_tx: watch::Sender<usize>,
}

/// Thread-safe result store.
#[derive(Clone)]
pub struct ResultStore {
    inner: Arc<Inner>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_snapshot(ResultSnapshot::default())
    }

    /// Create a store seeded with a previously persisted snapshot.
    pub fn from_snapshot(snapshot: ResultSnapshot) -> Self {
        let (probes, unparsed) = snapshot.into_parts();
        let active = probes.values().filter(|s| s.status.is_active()).count();
        let (active_tx, _) = watch::channel(active);
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(Records {
                    probes,
                    active,
                    detached: HashSet::new(),
                    unparsed,
                }),
                active_tx,
            }),
        }
    }

    /// Load the results file at `path`; missing or corrupt files give an empty store.
    pub fn load(path: &Path) -> Self {
        Self::from_snapshot(ResultSnapshot::load_lenient(path))
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically merge `update` into the named probe's record.
    ///
    /// The record is created if absent. A status change stamps `last_run`
    /// unless the update sets it explicitly. Returns the merged record.
    pub fn merge_update(&self, name: &str, mut update: StateUpdate) -> StateResult<ProbeState> {
        let mut records = self.lock();

        let previous = records.probes.get(name).map(|s| s.status);
        if let (Some(from), Some(to)) = (previous, update.status) {
            if !from.can_transition_to(to) {
                return Err(StateError::InvalidTransition {
                    probe: name.to_string(),
                    from,
                    to,
                });
            }
        }
        if update.last_run.is_none() && update.status.is_some() && update.status != previous {
            update.last_run = Some(epoch_secs_f64());
        }

        records.unparsed.remove(name);
        let state = records.probes.entry(name.to_string()).or_default();
        update.apply_to(state);
        let merged = state.clone();

        // A merged record is tracked again even if it was detached.
        let was_active =
            previous.is_some_and(ProbeStatus::is_active) && !records.detached.remove(name);
        match (was_active, merged.status.is_active()) {
            (false, true) => records.active += 1,
            (true, false) => records.active -= 1,
            _ => {}
        }
        let active = records.active;
        self.inner.active_tx.send_replace(active);
        drop(records);

        trace!(probe = %name, status = %merged.status, active, "state merged");
        Ok(merged)
    }

    /// Stop counting non-terminal records rejected by `keep` as active.
    ///
    /// The records themselves are left untouched and still saved. Returns
    /// the names that were detached.
    pub fn detach_active<F>(&self, keep: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut records = self.lock();
        let names: Vec<String> = records
            .probes
            .iter()
            .filter(|(name, state)| {
                state.status.is_active()
                    && !keep(name.as_str())
                    && !records.detached.contains(name.as_str())
            })
            .map(|(name, _)| name.clone())
            .collect();
        if names.is_empty() {
            return names;
        }

        records.active -= names.len();
        records.detached.extend(names.iter().cloned());
        let active = records.active;
        self.inner.active_tx.send_replace(active);
        drop(records);

        debug!(detached = names.len(), active, "detached records from the active count");
        names
    }

    /// Current record for a probe.
    pub fn get(&self, name: &str) -> Option<ProbeState> {
        self.lock().probes.get(name).cloned()
    }

    /// Point-in-time copy of every record.
    pub fn snapshot(&self) -> ResultSnapshot {
        let records = self.lock();
        ResultSnapshot::from_parts(records.probes.clone(), records.unparsed.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().probes.is_empty()
    }

    /// Number of probes not yet in a terminal status.
    pub fn active_count(&self) -> usize {
        self.lock().active
    }

    /// Subscribe to the active-probe count.
    ///
    /// The value is republished on every merge, so a receiver observes zero
    /// as soon as the last active probe reaches a terminal status.
    pub fn watch_active(&self) -> watch::Receiver<usize> {
        self.inner.active_tx.subscribe()
    }

    /// Snapshot the store and write it atomically to `path`.
    pub fn save(&self, path: &Path) -> StateResult<()> {
        let snapshot = self.snapshot();
        snapshot.write(path)?;
        debug!(?path, probes = snapshot.len(), "store saved");
        Ok(())
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_creates_missing_record() {
        let store = ResultStore::new();
        let state = store
            .merge_update("probe_a", StateUpdate::status(ProbeStatus::Pending).with_retries(0))
            .unwrap();
        assert_eq!(state.status, ProbeStatus::Pending);
        assert!(state.last_run > 0.0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn merge_keeps_unspecified_fields() {
        let store = ResultStore::new();
        store
            .merge_update("p", StateUpdate::status(ProbeStatus::Pending).with_retries(2))
            .unwrap();
        store
            .merge_update("p", StateUpdate::new().with_error("Timeout").with_duration(3.0))
            .unwrap();
        let state = store.get("p").unwrap();
        assert_eq!(state.status, ProbeStatus::Pending);
        assert_eq!(state.retries, 2);
        assert_eq!(state.error, "Timeout");
        assert_eq!(state.duration, 3.0);
    }

    #[test]
    fn illegal_transition_is_rejected_and_record_untouched() {
        let store = ResultStore::new();
        store
            .merge_update("p", StateUpdate::status(ProbeStatus::SkippedNoExample))
            .unwrap();
        let err = store
            .merge_update("p", StateUpdate::status(ProbeStatus::Sleeping).with_retries(9))
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
        assert_eq!(store.get("p").unwrap().retries, 0);
    }

    #[test]
    fn active_count_follows_lifecycle() {
        let store = ResultStore::new();
        let rx = store.watch_active();

        store.merge_update("a", StateUpdate::status(ProbeStatus::Pending)).unwrap();
        store.merge_update("b", StateUpdate::status(ProbeStatus::Pending)).unwrap();
        store
            .merge_update("c", StateUpdate::status(ProbeStatus::SkippedNoExample))
            .unwrap();
        assert_eq!(*rx.borrow(), 2);

        for status in [ProbeStatus::Sleeping, ProbeStatus::Running, ProbeStatus::Success] {
            store.merge_update("a", StateUpdate::status(status)).unwrap();
        }
        assert_eq!(*rx.borrow(), 1);

        for status in [
            ProbeStatus::Sleeping,
            ProbeStatus::Running,
            ProbeStatus::FailedMaxRetries,
        ] {
            store.merge_update("b", StateUpdate::status(status)).unwrap();
        }
        assert_eq!(*rx.borrow(), 0);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn seeded_store_counts_restored_active_records() {
        let mut snapshot = ResultSnapshot::default();
        snapshot.insert(
            "done",
            ProbeState {
                status: ProbeStatus::Success,
                ..ProbeState::default()
            },
        );
        snapshot.insert(
            "waiting",
            ProbeState {
                status: ProbeStatus::WaitingRetry,
                retries: 1,
                ..ProbeState::default()
            },
        );
        let store = ResultStore::from_snapshot(snapshot);
        assert_eq!(store.active_count(), 1);
        assert_eq!(*store.watch_active().borrow(), 1);
    }

    #[test]
    fn detached_records_stop_counting_but_are_kept() {
        let mut snapshot = ResultSnapshot::default();
        snapshot.insert(
            "stale",
            ProbeState {
                status: ProbeStatus::Pending,
                retries: 2,
                ..ProbeState::default()
            },
        );
        snapshot.insert(
            "kept",
            ProbeState {
                status: ProbeStatus::WaitingRetry,
                ..ProbeState::default()
            },
        );
        let store = ResultStore::from_snapshot(snapshot);
        let rx = store.watch_active();
        assert_eq!(*rx.borrow(), 2);

        assert_eq!(store.detach_active(|name| name == "kept"), ["stale"]);
        assert_eq!(*rx.borrow(), 1);
        assert!(store.detach_active(|name| name == "kept").is_empty());
        assert_eq!(store.active_count(), 1);

        let stale = store.get("stale").unwrap();
        assert_eq!(stale.status, ProbeStatus::Pending);
        assert_eq!(stale.retries, 2);

        // Merging into a detached record tracks it again.
        store
            .merge_update("stale", StateUpdate::status(ProbeStatus::Sleeping))
            .unwrap();
        assert_eq!(store.active_count(), 2);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let store = ResultStore::new();
        store
            .merge_update(
                "x",
                StateUpdate::status(ProbeStatus::Pending)
                    .with_retries(0)
                    .with_last_run(1_700_000_000.5),
            )
            .unwrap();
        store.save(&path).unwrap();

        let reloaded = ResultStore::load(&path);
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn undecodable_records_are_saved_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, r#"{"legacy": {"status": "empty_data"}}"#).unwrap();

        let store = ResultStore::load(&path);
        assert!(store.is_empty());
        store
            .merge_update("fresh", StateUpdate::status(ProbeStatus::Pending))
            .unwrap();
        store.save(&path).unwrap();

        let saved = ResultSnapshot::read(&path).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.unparsed()["legacy"]["status"], "empty_data");
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::load(&dir.path().join("nope.json"));
        assert!(store.is_empty());
        assert_eq!(store.active_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_merges_are_not_lost() {
        let store = ResultStore::new();
        let mut handles = Vec::new();
        for worker in 0..8u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50u32 {
                    let name = format!("probe-{worker}-{i}");
                    store
                        .merge_update(&name, StateUpdate::status(ProbeStatus::Pending))
                        .unwrap();
                    store
                        .merge_update(&name, StateUpdate::new().with_retries(i))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 400);
        assert_eq!(store.active_count(), 400);
        assert_eq!(store.get("probe-7-49").unwrap().retries, 49);
    }
}
