//! ResultSnapshot — the persisted `{probe name → ProbeState}` mapping.
//!
//! Snapshots are written as a single JSON object ordered by status and
//! then by name, indented with four spaces. Writes go to a temporary file
//! in the same directory which is then renamed over the target, so readers
//! never observe a half-written file.
//!
//! Records that do not decode, such as ones carrying a status this build
//! does not know, are kept verbatim and written back after the typed ones.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::types::{ProbeState, ProbeStatus};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// A point-in-time copy of every probe record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSnapshot {
    probes: BTreeMap<String, ProbeState>,
    /// Raw records that failed to decode, keyed by name.
    unparsed: BTreeMap<String, Value>,
}

impl ResultSnapshot {
    pub fn new(probes: BTreeMap<String, ProbeState>) -> Self {
        Self::from_parts(probes, BTreeMap::new())
    }

    /// A snapshot carrying undecodable records alongside the typed ones.
    ///
    /// A typed record wins over a raw one with the same name.
    pub fn from_parts(
        probes: BTreeMap<String, ProbeState>,
        mut unparsed: BTreeMap<String, Value>,
    ) -> Self {
        unparsed.retain(|name, _| !probes.contains_key(name));
        Self { probes, unparsed }
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ProbeState> {
        self.probes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProbeState> {
        self.probes.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, state: ProbeState) {
        let name = name.into();
        self.unparsed.remove(&name);
        self.probes.insert(name, state);
    }

    /// Raw records that could not be decoded. They are not counted by
    /// [`len`](Self::len) but are written back unchanged.
    pub fn unparsed(&self) -> &BTreeMap<String, Value> {
        &self.unparsed
    }

    /// Records in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProbeState)> {
        self.probes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ProbeState)> {
        self.probes.iter_mut()
    }

    /// Records ordered by status string, then by name.
    pub fn iter_by_status(&self) -> Vec<(&String, &ProbeState)> {
        let mut entries: Vec<_> = self.probes.iter().collect();
        entries.sort_by(|(a_name, a), (b_name, b)| {
            a.status
                .as_str()
                .cmp(b.status.as_str())
                .then_with(|| a_name.cmp(b_name))
        });
        entries
    }

    /// Names of probes currently in `status`.
    pub fn names_with_status(&self, status: ProbeStatus) -> Vec<&str> {
        self.probes
            .iter()
            .filter(|(_, state)| state.status == status)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn into_parts(self) -> (BTreeMap<String, ProbeState>, BTreeMap<String, Value>) {
        (self.probes, self.unparsed)
    }

    /// Render the snapshot as the on-disk JSON document.
    pub fn to_json_pretty(&self) -> StateResult<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser).map_err(map_err!(Serialize))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Parse a results document.
    ///
    /// The document itself must be a JSON object. Records that do not
    /// decode are set aside in [`unparsed`](Self::unparsed).
    pub fn from_json_slice(bytes: &[u8]) -> StateResult<Self> {
        let document: serde_json::Map<String, Value> =
            serde_json::from_slice(bytes).map_err(map_err!(Deserialize))?;

        let mut probes = BTreeMap::new();
        let mut unparsed = BTreeMap::new();
        for (name, value) in document {
            match ProbeState::deserialize(&value) {
                Ok(state) => {
                    probes.insert(name, state);
                }
                Err(e) => {
                    debug!(probe = %name, error = %e, "result record did not decode");
                    unparsed.insert(name, value);
                }
            }
        }
        if !unparsed.is_empty() {
            warn!(
                count = unparsed.len(),
                "keeping undecodable result records as-is"
            );
        }
        Ok(Self { probes, unparsed })
    }

    /// Read a results file. A missing file is an error.
    pub fn read(path: &Path) -> StateResult<Self> {
        if !path.exists() {
            return Err(StateError::NotFound(path.display().to_string()));
        }
        let bytes = fs::read(path).map_err(map_err!(Read))?;
        Self::from_json_slice(&bytes)
    }

    /// Read a results file, treating any failure as "no prior state".
    pub fn load_lenient(path: &Path) -> Self {
        match Self::read(path) {
            Ok(snapshot) => {
                debug!(?path, probes = snapshot.len(), "results loaded");
                snapshot
            }
            Err(StateError::NotFound(_)) => {
                debug!(?path, "no previous results");
                Self::default()
            }
            Err(e) => {
                warn!(?path, error = %e, "previous results unreadable, starting fresh");
                Self::default()
            }
        }
    }

    /// Atomically replace the file at `path` with this snapshot.
    pub fn write(&self, path: &Path) -> StateResult<()> {
        let bytes = self.to_json_pretty()?;
        atomic_write(path, &bytes)?;
        debug!(?path, probes = self.len(), "results written");
        Ok(())
    }
}

impl Serialize for ResultSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.iter_by_status();
        let mut map = serializer.serialize_map(Some(entries.len() + self.unparsed.len()))?;
        for (name, state) in entries {
            map.serialize_entry(name, state)?;
        }
        for (name, raw) in &self.unparsed {
            map.serialize_entry(name, raw)?;
        }
        map.end()
    }
}

/// Replace `path` with `bytes` through a synced temporary file and a rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> StateResult<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(map_err!(Write))?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));

    let mut file = fs::File::create(&tmp).map_err(map_err!(Write))?;
    file.write_all(bytes).map_err(map_err!(Write))?;
    file.sync_all().map_err(map_err!(Write))?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StateError::Write(e.to_string()));
    }
    if let Some(parent) = parent {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
