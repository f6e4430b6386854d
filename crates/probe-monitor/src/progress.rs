//! Aggregate status counts and the single-line progress summary.

use std::collections::BTreeMap;
use std::fmt;

use probe_state::{ProbeStatus, ResultSnapshot};
use serde::Serialize;

/// Number of probes per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    counts: BTreeMap<ProbeStatus, usize>,
}

impl StatusCounts {
    pub fn from_snapshot(snapshot: &ResultSnapshot) -> Self {
        let mut counts = BTreeMap::new();
        for (_, state) in snapshot.iter() {
            *counts.entry(state.status).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn get(&self, status: ProbeStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Probes in pending, sleeping, running or waiting_retry.
    pub fn active(&self) -> usize {
        self.counts
            .iter()
            .filter(|(status, _)| status.is_active())
            .map(|(_, n)| n)
            .sum()
    }

    /// The progress line, without carriage return.
    pub fn render_line(&self) -> String {
        format!(
            "Status: OK: {} | Fail: {} | Sleep: {} | Run: {} | RetryWait: {} | Pending: {}",
            self.get(ProbeStatus::Success),
            self.get(ProbeStatus::FailedMaxRetries),
            self.get(ProbeStatus::Sleeping),
            self.get(ProbeStatus::Running),
            self.get(ProbeStatus::WaitingRetry),
            self.get(ProbeStatus::Pending),
        )
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_line())
    }
}
