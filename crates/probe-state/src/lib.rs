//! probe-state — the result store for probegrid runs.
//!
//! Holds one [`ProbeState`] per probe behind a single mutex and persists
//! full snapshots of the mapping as a JSON object keyed by probe name.
//!
//! # Architecture
//!
//! ```text
//! ResultStore (Clone, Arc<Mutex<..>>)
//!   ├── merge_update(name, StateUpdate) → validated transition
//!   ├── snapshot() → ResultSnapshot
//!   ├── watch_active() → active-probe countdown
//!   └── save(path) / load(path) → atomic JSON file
//! ```
//!
//! Loading is lenient: a missing or corrupt results file yields an empty
//! store, and individual malformed records are skipped.

pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use snapshot::{ResultSnapshot, atomic_write};
pub use store::ResultStore;
pub use types::*;
