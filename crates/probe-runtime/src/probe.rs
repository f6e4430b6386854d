//! The probe interface and snippet binding.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::fault::ProbeFault;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Result of one probe attempt. Absence of a fault is the only success signal.
pub type ProbeOutcome = Result<(), ProbeFault>;

/// A runnable probe.
pub trait ProbeFn: Send + Sync {
    fn call(&self, ctx: ProbeContext) -> BoxFuture<ProbeOutcome>;
}

/// Binds a catalog snippet into a runnable probe, once, at load time.
///
/// Returning `None` marks the snippet as not runnable; the probe is then
/// treated exactly like one without an example.
pub trait ProbeBinder: Send + Sync {
    fn bind(&self, name: &str, snippet: &str) -> Option<Arc<dyn ProbeFn>>;
}

/// The fixed scope handed to every probe attempt.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    name: Arc<str>,
    network_timeout: Duration,
}

impl ProbeContext {
    pub fn new(name: &str, network_timeout: Duration) -> Self {
        Self {
            name: Arc::from(name),
            network_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound on any single network operation.
    pub fn network_timeout(&self) -> Duration {
        self.network_timeout
    }

    /// Run one I/O operation under the network timeout.
    pub async fn io<F, T>(&self, operation: F) -> Result<T, ProbeFault>
    where
        F: Future<Output = Result<T, ProbeFault>>,
    {
        match tokio::time::timeout(self.network_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(ProbeFault::Timeout),
        }
    }
}

struct FnProbe<F>(F);

impl<F, Fut> ProbeFn for FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    fn call(&self, ctx: ProbeContext) -> BoxFuture<ProbeOutcome> {
        Box::pin((self.0)(ctx))
    }
}

/// Wrap an async closure as a probe.
pub fn probe_fn<F, Fut>(f: F) -> Arc<dyn ProbeFn>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    Arc::new(FnProbe(f))
}

/// Binds probes from a table of natively implemented probes keyed by name.
///
/// A catalog entry whose name is not registered is not runnable.
#[derive(Default, Clone)]
pub struct RegistryBinder {
    probes: HashMap<String, Arc<dyn ProbeFn>>,
}

impl RegistryBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, probe: Arc<dyn ProbeFn>) -> Self {
        self.probes.insert(name.into(), probe);
        self
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl fmt::Debug for RegistryBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.probes.keys().collect();
        names.sort();
        f.debug_struct("RegistryBinder").field("probes", &names).finish()
    }
}

impl ProbeBinder for RegistryBinder {
    fn bind(&self, name: &str, _snippet: &str) -> Option<Arc<dyn ProbeFn>> {
        self.probes.get(name).cloned()
    }
}
