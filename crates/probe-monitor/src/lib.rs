//! probe-monitor — progress reporting and completion detection.
//!
//! # Architecture
//!
//! ```text
//! ProgressMonitor::run()
//!   ├── every interval: snapshot → save → StatusCounts → progress line
//!   ├── active-count watch: completes as soon as nothing is active
//!   │   and the submission pass has finished
//!   └── shutdown watch: final save, exit Interrupted
//! ```
//!
//! A failed save is logged and retried on the next tick; the monitor only
//! reports persistence as broken if no save ever succeeded.

pub mod monitor;
pub mod progress;

pub use monitor::{MonitorExit, MonitorReport, ProgressMonitor};
pub use progress::StatusCounts;
