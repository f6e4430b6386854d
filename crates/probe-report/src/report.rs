//! RunReport — a summary of a finished (or interrupted) run.

use std::fmt;

use probe_state::{ProbeStatus, ResultSnapshot};
use serde::Serialize;

/// Examples listed per failure bucket.
const MAX_EXAMPLES: usize = 3;

/// Unrecognized reasons are grouped by this many leading characters.
const REASON_PREFIX_CHARS: usize = 50;

/// Share of the run in one status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub status: ProbeStatus,
    pub count: usize,
    pub percent: f64,
}

/// Timing of successful probes, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
}

impl DurationStats {
    /// `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        Some(Self {
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
            max: sorted[n - 1],
            min: sorted[0],
        })
    }
}

/// Terminally failed probes sharing a simplified reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureBucket {
    pub reason: String,
    pub count: usize,
    /// Up to three probe names.
    pub examples: Vec<String>,
}

/// Full report over a results snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub total: usize,
    /// One entry per status, in lifecycle order.
    pub statuses: Vec<StatusShare>,
    pub success_durations: Option<DurationStats>,
    /// Sorted by count, largest first.
    pub failures: Vec<FailureBucket>,
}

impl RunReport {
    pub fn from_snapshot(snapshot: &ResultSnapshot) -> Self {
        let total = snapshot.len();

        let statuses = ProbeStatus::ALL
            .iter()
            .map(|&status| {
                let count = snapshot.iter().filter(|(_, s)| s.status == status).count();
                StatusShare {
                    status,
                    count,
                    percent: percent(count, total),
                }
            })
            .collect();

        let durations: Vec<f64> = snapshot
            .iter()
            .filter(|(_, s)| s.status == ProbeStatus::Success)
            .map(|(_, s)| s.duration)
            .collect();

        let mut failures: Vec<(String, Vec<String>)> = Vec::new();
        for (name, state) in snapshot.iter() {
            if state.status != ProbeStatus::FailedMaxRetries {
                continue;
            }
            let reason = bucket_reason(&state.error);
            match failures.iter_mut().find(|(r, _)| *r == reason) {
                Some((_, names)) => names.push(name.clone()),
                None => failures.push((reason, vec![name.clone()])),
            }
        }
        // Stable, so ties keep first-seen order.
        failures.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        Self {
            total,
            statuses,
            success_durations: DurationStats::from_samples(&durations),
            failures: failures
                .into_iter()
                .map(|(reason, names)| FailureBucket {
                    reason,
                    count: names.len(),
                    examples: names.into_iter().take(MAX_EXAMPLES).collect(),
                })
                .collect(),
        }
    }

    pub fn count(&self, status: ProbeStatus) -> usize {
        self.statuses
            .iter()
            .find(|s| s.status == status)
            .map_or(0, |s| s.count)
    }

    fn percent_of(&self, status: ProbeStatus) -> f64 {
        percent(self.count(status), self.total)
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

/// Collapse a stored failure reason into a reporting bucket.
pub fn bucket_reason(error: &str) -> String {
    let lower = error.to_lowercase();
    let bucket = if error.contains("ProxyError") {
        "ProxyError (network or connection issue)"
    } else if lower.contains("timeout") || lower.contains("timed out") {
        "Timeout"
    } else if error.contains("404") {
        "404 Not Found"
    } else if error.contains("403") {
        "403 Forbidden"
    } else if error.contains("KeyError") {
        "KeyError (data parsing issue)"
    } else if error.contains("AttributeError") {
        "AttributeError (code compatibility)"
    } else if error.contains("TypeError") {
        "TypeError"
    } else if error.contains("ValueError") {
        "ValueError"
    } else if error.contains("IndexError") {
        "IndexError"
    } else if error.contains("Expecting value") || error.starts_with("malformed response") {
        "JSON Decode Error"
    } else if error.contains("'NoneType' object") {
        "NoneType Error (possibly missing data)"
    } else if error.chars().count() > REASON_PREFIX_CHARS {
        let prefix: String = error.chars().take(REASON_PREFIX_CHARS).collect();
        return format!("{prefix}...");
    } else {
        return error.to_string();
    };
    bucket.to_string()
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let success = self.count(ProbeStatus::Success);
        let failed = self.count(ProbeStatus::FailedMaxRetries);
        let skipped = self.count(ProbeStatus::SkippedNoExample);

        writeln!(f, "=== Overview ===")?;
        writeln!(f, "Total probes: {}", self.total)?;
        writeln!(
            f,
            "Success: {success} ({:.1}%)",
            self.percent_of(ProbeStatus::Success)
        )?;
        writeln!(
            f,
            "Failed (max retries): {failed} ({:.1}%)",
            self.percent_of(ProbeStatus::FailedMaxRetries)
        )?;
        writeln!(f, "Skipped (no example): {skipped}")?;
        writeln!(f, "Other: {}", self.total - success - failed - skipped)?;

        if let Some(stats) = &self.success_durations {
            writeln!(f)?;
            writeln!(f, "=== Success durations ===")?;
            writeln!(f, "Mean: {:.2}s", stats.mean)?;
            writeln!(f, "Median: {:.2}s", stats.median)?;
            writeln!(f, "Max: {:.2}s", stats.max)?;
            writeln!(f, "Min: {:.2}s", stats.min)?;
        }

        writeln!(f)?;
        writeln!(f, "=== Failure reasons ===")?;
        for bucket in &self.failures {
            writeln!(f, "- {}: {} probes", bucket.reason, bucket.count)?;
            let mut examples = bucket.examples.join(", ");
            if bucket.count > bucket.examples.len() {
                examples.push_str(", ...");
            }
            writeln!(f, "  e.g. {examples}")?;
        }
        Ok(())
    }
}
