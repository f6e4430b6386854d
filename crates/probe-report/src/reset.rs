//! Reset terminally failed probes so the next run retries them.

use std::path::Path;

use probe_state::{ProbeStatus, ResultSnapshot};
use tracing::info;

use crate::error::ReportResult;

/// Move every `failed_max_retries` record back to `pending` with a clean
/// retry count and error. Returns how many were reset.
pub fn reset_failed(snapshot: &mut ResultSnapshot) -> usize {
    let mut count = 0;
    for (_, state) in snapshot.iter_mut() {
        if state.status == ProbeStatus::FailedMaxRetries {
            state.status = ProbeStatus::Pending;
            state.retries = 0;
            state.error.clear();
            count += 1;
        }
    }
    count
}

/// [`reset_failed`] applied to the results file at `path`, in place.
///
/// A missing results file is an error.
pub fn reset_failed_file(path: &Path) -> ReportResult<usize> {
    let mut snapshot = ResultSnapshot::read(path)?;
    let count = reset_failed(&mut snapshot);
    snapshot.write(path)?;
    info!(?path, count, "reset failed probes to pending");
    Ok(count)
}
