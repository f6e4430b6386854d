//! probe-report — offline tools that work on a saved results file.
//!
//! - [`RunReport`]: status breakdown, success timings and failure buckets.
//! - [`reset_failed`]: put terminally failed probes back to `pending` so the
//!   next run retries them.
//! - [`mark_unavailable`]: flag failed probes in a capability listing.

pub mod availability;
pub mod error;
pub mod report;
pub mod reset;

pub use availability::{UNAVAILABLE_PREFIX, mark_unavailable, mark_unavailable_file};
pub use error::{ReportError, ReportResult};
pub use report::{DurationStats, FailureBucket, RunReport, StatusShare, bucket_reason};
pub use reset::{reset_failed, reset_failed_file};
