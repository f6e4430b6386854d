//! probe-scheduler — drives every probe through its lifecycle.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::run()
//!   ├── prepare(): bind snippets, initialize pending / skipped records,
//!   │   leave terminal records from a previous run untouched
//!   ├── submitter task → WorkerPool (paced by submit_delay)
//!   ├── WorkerPool (fixed workers, unbounded queue)
//!   │   └── AttemptRunner: sleeping → jitter → running → Sandbox
//!   │       ├── success → success
//!   │       └── failure → RetryScheduler::on_failure
//!   ├── RetryScheduler timer task (DelayQueue) → back into WorkerPool
//!   └── ProgressMonitor (snapshots, completion, shutdown)
//! ```
//!
//! All per-probe state lives in the shared `ResultStore`; nothing here
//! keeps its own copy of a probe's status.

pub mod attempt;
pub mod error;
pub mod orchestrator;
pub mod pacing;
pub mod pool;
pub mod retry;

pub use attempt::AttemptRunner;
pub use error::{SchedulerError, SchedulerResult};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Prepared, RunSummary};
pub use pacing::Pacing;
pub use pool::{BoundProbe, PoolHandle, WorkHandler, WorkItem, WorkerPool};
pub use retry::{RetryDecision, RetryPolicy, RetryScheduler};
