//! probe-runtime — the execution sandbox for probegrid.
//!
//! A probe is anything implementing [`ProbeFn`]: a function of a fixed
//! [`ProbeContext`] returning `Ok(())` or a typed [`ProbeFault`]. Catalog
//! snippets are bound once into probes by a [`ProbeBinder`]; the
//! production binder ([`InterpreterBinder`]) runs each snippet in a child
//! interpreter with its output discarded.
//!
//! [`Sandbox::execute`] is the only entry point used by the scheduler. It
//! runs one attempt on its own task so that panics are contained, times the
//! attempt, and folds every fault into an [`Outcome`].

pub mod fault;
pub mod interpreter;
pub mod probe;
pub mod sandbox;

pub use fault::{MAX_REASON_CHARS, ProbeFault, normalize_reason};
pub use interpreter::InterpreterBinder;
pub use probe::{BoxFuture, ProbeBinder, ProbeContext, ProbeFn, ProbeOutcome, RegistryBinder, probe_fn};
pub use sandbox::{Execution, Outcome, Sandbox};
