//! Domain types for the result store.
//!
//! These types are the persisted per-probe records. Field names and
//! status strings are part of the results file format read by the
//! report, reset and mark-unavailable tools.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    #[default]
    Pending,
    Sleeping,
    Running,
    WaitingRetry,
    Success,
    FailedMaxRetries,
    SkippedNoExample,
}

impl ProbeStatus {
    pub const ALL: [ProbeStatus; 7] = [
        ProbeStatus::Pending,
        ProbeStatus::Sleeping,
        ProbeStatus::Running,
        ProbeStatus::WaitingRetry,
        ProbeStatus::Success,
        ProbeStatus::FailedMaxRetries,
        ProbeStatus::SkippedNoExample,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStatus::Pending => "pending",
            ProbeStatus::Sleeping => "sleeping",
            ProbeStatus::Running => "running",
            ProbeStatus::WaitingRetry => "waiting_retry",
            ProbeStatus::Success => "success",
            ProbeStatus::FailedMaxRetries => "failed_max_retries",
            ProbeStatus::SkippedNoExample => "skipped_no_example",
        }
    }

    /// No further transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProbeStatus::Success | ProbeStatus::FailedMaxRetries | ProbeStatus::SkippedNoExample
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether the probe state machine allows moving from `self` to `next`.
    ///
    /// Re-initialization to `pending` or `skipped_no_example` is allowed from
    /// any non-terminal status, which is how resumed runs restart probes
    /// left in flight by an earlier process.
    pub fn can_transition_to(self, next: ProbeStatus) -> bool {
        use ProbeStatus::*;

        if self == next {
            return true;
        }
        match (self, next) {
            (from, Pending | SkippedNoExample) => from.is_active(),
            (Pending | WaitingRetry, Sleeping) => true,
            (Sleeping, Running) => true,
            (Running, Success | WaitingRetry | FailedMaxRetries) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of a single probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeState {
    pub status: ProbeStatus,
    /// Attempt index of the last execution (0 for the first attempt).
    pub retries: u32,
    /// Normalized failure reason of the last attempt; empty on success.
    pub error: String,
    /// Wall-clock seconds spent in the last attempt.
    pub duration: f64,
    /// Unix timestamp (seconds) of the last state transition.
    pub last_run: f64,
}

/// A partial update merged into a [`ProbeState`].
///
/// Only the fields that are set are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub status: Option<ProbeStatus>,
    pub retries: Option<u32>,
    pub error: Option<String>,
    pub duration: Option<f64>,
    pub last_run: Option<f64>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// An update that only changes the status.
    pub fn status(status: ProbeStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_last_run(mut self, last_run: f64) -> Self {
        self.last_run = Some(last_run);
        self
    }

    pub(crate) fn apply_to(self, state: &mut ProbeState) {
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(retries) = self.retries {
            state.retries = retries;
        }
        if let Some(error) = self.error {
            state.error = error;
        }
        if let Some(duration) = self.duration {
            state.duration = duration;
        }
        if let Some(last_run) = self.last_run {
            state.last_run = last_run;
        }
    }
}

/// Current unix time in fractional seconds.
pub fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_results_format() {
        for status in ProbeStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = ProbeStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                ProbeStatus::Success,
                ProbeStatus::FailedMaxRetries,
                ProbeStatus::SkippedNoExample
            ]
        );
    }

    #[test]
    fn lifecycle_transitions_are_allowed() {
        use ProbeStatus::*;
        assert!(Pending.can_transition_to(Sleeping));
        assert!(Sleeping.can_transition_to(Running));
        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(WaitingRetry));
        assert!(Running.can_transition_to(FailedMaxRetries));
        assert!(WaitingRetry.can_transition_to(Sleeping));
        assert!(Running.can_transition_to(Pending));
    }

    #[test]
    fn terminal_statuses_are_final() {
        use ProbeStatus::*;
        for terminal in [Success, FailedMaxRetries, SkippedNoExample] {
            for next in ProbeStatus::ALL {
                assert_eq!(terminal.can_transition_to(next), terminal == next);
            }
        }
    }

    #[test]
    fn shortcuts_are_rejected() {
        use ProbeStatus::*;
        assert!(!Pending.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Success));
        assert!(!Sleeping.can_transition_to(Success));
        assert!(!WaitingRetry.can_transition_to(Running));
    }

    #[test]
    fn partial_record_deserializes_with_defaults() {
        let state: ProbeState = serde_json::from_str(r#"{"status": "waiting_retry", "retries": 1}"#).unwrap();
        assert_eq!(state.status, ProbeStatus::WaitingRetry);
        assert_eq!(state.retries, 1);
        assert_eq!(state.error, "");
        assert_eq!(state.duration, 0.0);
    }

    #[test]
    fn update_applies_only_set_fields() {
        let mut state = ProbeState {
            status: ProbeStatus::Running,
            retries: 2,
            error: "Timeout".to_string(),
            duration: 1.5,
            last_run: 10.0,
        };
        StateUpdate::status(ProbeStatus::Success)
            .with_error("")
            .apply_to(&mut state);
        assert_eq!(state.status, ProbeStatus::Success);
        assert_eq!(state.retries, 2);
        assert_eq!(state.error, "");
        assert_eq!(state.duration, 1.5);
    }
}
