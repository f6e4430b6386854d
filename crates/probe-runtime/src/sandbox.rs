//! Sandbox — runs one probe attempt and reduces it to an outcome.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::fault::ProbeFault;
use crate::probe::{ProbeContext, ProbeFn};

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ProbeFault),
}

/// A finished attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: Outcome,
    pub duration: Duration,
}

impl Execution {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Normalized failure reason, empty on success.
    pub fn error_reason(&self) -> String {
        match &self.outcome {
            Outcome::Success => String::new(),
            Outcome::Failure(fault) => fault.reason(),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Executes probes with a process-wide network timeout.
#[derive(Debug, Clone)]
pub struct Sandbox {
    network_timeout: Duration,
}

impl Sandbox {
    pub fn new(network_timeout: Duration) -> Self {
        Self { network_timeout }
    }

    pub fn network_timeout(&self) -> Duration {
        self.network_timeout
    }

    /// Run one attempt of `probe`.
    ///
    /// The attempt runs on its own task; a panic inside the probe becomes
    /// [`ProbeFault::Panicked`]. Nothing escapes as an error.
    pub async fn execute(&self, name: &str, probe: &Arc<dyn ProbeFn>) -> Execution {
        let ctx = ProbeContext::new(name, self.network_timeout);
        let started = Instant::now();

        let outcome = match tokio::spawn(probe.call(ctx)).await {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err(fault)) => Outcome::Failure(fault),
            Err(e) if e.is_panic() => {
                Outcome::Failure(ProbeFault::Panicked(panic_message(e.into_panic())))
            }
            Err(e) => Outcome::Failure(ProbeFault::Remote(e.to_string())),
        };

        let execution = Execution {
            outcome,
            duration: started.elapsed(),
        };
        debug!(
            probe = %name,
            success = execution.is_success(),
            duration_ms = execution.duration.as_millis() as u64,
            "attempt finished"
        );
        execution
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe_fn;

    fn sandbox() -> Sandbox {
        Sandbox::new(Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn success_has_empty_reason() {
        let probe = probe_fn(|_ctx| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(())
        });
        let execution = sandbox().execute("ok", &probe).await;
        assert!(execution.is_success());
        assert_eq!(execution.error_reason(), "");
        assert!(execution.duration >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn fault_is_normalized() {
        let probe = probe_fn(|_ctx| async { Err(ProbeFault::http(404, "no such endpoint")) });
        let execution = sandbox().execute("gone", &probe).await;
        assert_eq!(execution.outcome, Outcome::Failure(ProbeFault::NotFound));
        assert_eq!(execution.error_reason(), "404 Not Found");
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let probe = probe_fn(|_ctx| async {
            let rows: Vec<u32> = Vec::new();
            if rows.is_empty() {
                panic!("no rows returned");
            }
            Ok(())
        });
        let execution = sandbox().execute("boom", &probe).await;
        assert_eq!(
            execution.outcome,
            Outcome::Failure(ProbeFault::Panicked("no rows returned".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn context_timeout_surfaces_as_timeout() {
        let probe = probe_fn(|ctx: ProbeContext| async move {
            ctx.io(async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(())
            })
            .await
        });
        let execution = sandbox().execute("hang", &probe).await;
        assert_eq!(execution.error_reason(), "Timeout");
        assert!(execution.duration >= Duration::from_secs(30));
        assert!(execution.duration < Duration::from_secs(120));
    }

    #[tokio::test]
    async fn context_carries_probe_name() {
        let probe = probe_fn(|ctx: ProbeContext| async move {
            if ctx.name() == "named" {
                Ok(())
            } else {
                Err(ProbeFault::Remote(format!("wrong name {}", ctx.name())))
            }
        });
        assert!(sandbox().execute("named", &probe).await.is_success());
    }
}
