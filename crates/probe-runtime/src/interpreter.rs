//! Interpreter binding — runs catalog snippets in a child interpreter.
//!
//! Each bound snippet is prefixed with a preamble that pre-populates the
//! interpreter scope (data-access module, tabular helper, socket timeout).
//! The child's stdin and stdout are discarded; stderr is captured only to
//! classify the failure. The child is killed if the attempt is dropped.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace};

use crate::fault::ProbeFault;
use crate::probe::{BoxFuture, ProbeBinder, ProbeContext, ProbeFn, ProbeOutcome};

/// Binds snippets to child-interpreter invocations.
#[derive(Debug, Clone)]
pub struct InterpreterBinder {
    program: String,
    args: Vec<String>,
    preamble: String,
    network_timeout: Duration,
}

impl InterpreterBinder {
    /// `program args... <source>` is executed per attempt.
    ///
    /// `{timeout}` in the preamble is replaced by the network timeout in seconds.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        preamble: impl Into<String>,
        network_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            preamble: preamble.into(),
            network_timeout,
        }
    }

    /// Full source handed to the interpreter for `snippet`.
    pub fn render_source(&self, snippet: &str) -> String {
        let timeout = self.network_timeout.as_secs_f64().to_string();
        let preamble = self.preamble.replace("{timeout}", &timeout);
        if preamble.is_empty() {
            snippet.to_string()
        } else {
            format!("{}\n{}", preamble.trim_end(), snippet)
        }
    }
}

impl ProbeBinder for InterpreterBinder {
    fn bind(&self, name: &str, snippet: &str) -> Option<Arc<dyn ProbeFn>> {
        if snippet.trim().is_empty() {
            return None;
        }
        trace!(probe = %name, program = %self.program, "snippet bound");
        Some(Arc::new(InterpreterProbe {
            program: Arc::from(self.program.as_str()),
            args: Arc::from(self.args.clone()),
            source: Arc::from(self.render_source(snippet)),
        }))
    }
}

struct InterpreterProbe {
    program: Arc<str>,
    args: Arc<[String]>,
    source: Arc<str>,
}

impl ProbeFn for InterpreterProbe {
    fn call(&self, ctx: ProbeContext) -> BoxFuture<ProbeOutcome> {
        let program = self.program.clone();
        let args = self.args.clone();
        let source = self.source.clone();
        Box::pin(async move { run_interpreter(&program, &args, &source, &ctx).await })
    }
}

async fn run_interpreter(
    program: &str,
    args: &[String],
    source: &str,
    ctx: &ProbeContext,
) -> ProbeOutcome {
    let output = Command::new(program)
        .args(args)
        .arg(source)
        .env("PROBE_NAME", ctx.name())
        .env(
            "PROBE_NETWORK_TIMEOUT",
            ctx.network_timeout().as_secs_f64().to_string(),
        )
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProbeFault::Remote(format!("failed to start {program}: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(probe = %ctx.name(), status = %output.status, "interpreter exited with failure");
    Err(ProbeFault::from_stderr(&stderr)
        .unwrap_or_else(|| ProbeFault::Remote(format!("interpreter exited with {}", output.status))))
}
