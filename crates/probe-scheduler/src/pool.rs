//! Worker pool — a fixed number of workers draining one shared queue.
//!
//! Submission never blocks: the queue is unbounded and only the number of
//! workers bounds how many attempts run at once. Closing the pool stops
//! workers from picking up anything still queued; attempts already running
//! are left to finish or be dropped with the runtime.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use probe_runtime::{BoxFuture, ProbeFn};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{SchedulerError, SchedulerResult};

/// A probe with its bound runner, shared across all of its attempts.
pub struct BoundProbe {
    pub name: String,
    pub runner: Arc<dyn ProbeFn>,
}

impl BoundProbe {
    pub fn new(name: impl Into<String>, runner: Arc<dyn ProbeFn>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            runner,
        })
    }
}

impl fmt::Debug for BoundProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundProbe").field("name", &self.name).finish()
    }
}

/// One unit of work: a single attempt of a probe.
///
/// `attempt` is zero-based; the first execution is attempt 0.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub probe: Arc<BoundProbe>,
    pub attempt: u32,
}

impl WorkItem {
    pub fn first(probe: Arc<BoundProbe>) -> Self {
        Self { probe, attempt: 0 }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            attempt: self.attempt + 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.probe.name
    }
}

/// What a worker does with each item it takes.
pub type WorkHandler = Arc<dyn Fn(WorkItem) -> BoxFuture<()> + Send + Sync>;

/// Cloneable submission side of a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    tx: mpsc::UnboundedSender<WorkItem>,
    closed: Arc<watch::Sender<bool>>,
    submitted: Arc<AtomicU64>,
}

impl PoolHandle {
    /// Enqueue an item without waiting.
    pub fn submit(&self, item: WorkItem) -> SchedulerResult<()> {
        if *self.closed.borrow() {
            return Err(SchedulerError::PoolClosed);
        }
        trace!(probe = %item.name(), attempt = item.attempt, "submitting work item");
        self.tx.send(item).map_err(|_| SchedulerError::PoolClosed)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop admitting work. Queued items are dropped.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            debug!("worker pool closed");
        }
    }

    pub fn is_accepting(&self) -> bool {
        !*self.closed.borrow()
    }

    /// Total number of items accepted since the pool was created.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

/// A pool of `capacity` workers that has not been started yet.
pub struct WorkerPool {
    capacity: usize,
    handle: PoolHandle,
    queue: mpsc::UnboundedReceiver<WorkItem>,
}

impl WorkerPool {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, queue) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            capacity: capacity.max(1),
            handle: PoolHandle {
                tx,
                closed: Arc::new(closed),
                submitted: Arc::new(AtomicU64::new(0)),
            },
            queue,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Spawn the workers. Each one exits once the pool is closed.
    pub fn start(self, handler: WorkHandler) -> Vec<JoinHandle<()>> {
        let queue = Arc::new(Mutex::new(self.queue));
        (0..self.capacity)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let closed = self.handle.closed.subscribe();
                let handler = Arc::clone(&handler);
                tokio::spawn(worker_loop(id, queue, closed, handler))
            })
            .collect()
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    mut closed: watch::Receiver<bool>,
    handler: WorkHandler,
) {
    trace!(worker = id, "worker started");
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = wait_closed(&mut closed) => None,
                item = rx.recv() => item,
            }
        };

        let Some(item) = next else { break };
        if *closed.borrow() {
            break;
        }
        handler(item).await;
    }
    trace!(worker = id, "worker stopped");
}

/// Resolves once the pool is closed or every handle is gone.
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}
