//! Flag probes that failed terminally in a capability listing.
//!
//! The listing is a JSON array of `{ "function": { "name", "description", .. } }`
//! objects. Only the description of matching entries is touched; every
//! other field is preserved as-is.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use probe_state::{ProbeStatus, ResultSnapshot, atomic_write};
use serde_json::Value;
use tracing::info;

use crate::error::{ReportError, ReportResult};

pub const UNAVAILABLE_PREFIX: &str = "[UNAVAILABLE] ";

/// Marker searched for when deciding if an entry is already flagged.
const UNAVAILABLE_MARKER: &str = "[UNAVAILABLE]";

/// Prefix the description of every entry whose `function.name` is in
/// `failed`. Entries already flagged are left alone. Returns how many
/// entries changed.
pub fn mark_unavailable(listing: &mut Value, failed: &BTreeSet<String>) -> usize {
    let Some(entries) = listing.as_array_mut() else {
        return 0;
    };

    let mut updated = 0;
    for entry in entries {
        let Some(function) = entry.get_mut("function").and_then(Value::as_object_mut) else {
            continue;
        };
        let matches = function
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| failed.contains(name));
        if !matches {
            continue;
        }

        let description = function
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if description.contains(UNAVAILABLE_MARKER) {
            continue;
        }
        let flagged = format!("{UNAVAILABLE_PREFIX}{description}");
        function.insert("description".to_string(), Value::String(flagged));
        updated += 1;
    }
    updated
}

/// Read the results at `results_path` and flag every terminally failed
/// probe in the listing at `listing_path`, rewriting it in place.
pub fn mark_unavailable_file(results_path: &Path, listing_path: &Path) -> ReportResult<usize> {
    let results = ResultSnapshot::read(results_path)?;
    let failed: BTreeSet<String> = results
        .names_with_status(ProbeStatus::FailedMaxRetries)
        .into_iter()
        .map(str::to_string)
        .collect();

    let bytes = fs::read(listing_path).map_err(|source| ReportError::Read {
        path: listing_path.to_path_buf(),
        source,
    })?;
    let mut listing: Value = serde_json::from_slice(&bytes).map_err(|source| ReportError::Parse {
        path: listing_path.to_path_buf(),
        source,
    })?;
    if !listing.is_array() {
        return Err(ReportError::InvalidListing {
            path: listing_path.to_path_buf(),
        });
    }

    let updated = mark_unavailable(&mut listing, &failed);

    let mut rendered = serde_json::to_string_pretty(&listing).map_err(|source| ReportError::Parse {
        path: listing_path.to_path_buf(),
        source,
    })?;
    rendered.push('\n');
    atomic_write(listing_path, rendered.as_bytes())?;

    info!(failed = failed.len(), updated, path = ?listing_path, "capability listing updated");
    Ok(updated)
}
