//! Catalog manifest loading.
//!
//! The manifest is a JSON array of `{ "interface_name", "file" }` records
//! produced by the documentation ingestion step. Each `file` is resolved
//! relative to the manifest's directory and scanned for an example snippet.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::extract::SnippetExtractor;

/// One manifest record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub interface_name: String,
    pub file: String,
}

/// A named probe and its example snippet, if the page had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub name: String,
    pub snippet: Option<String>,
}

impl Probe {
    pub fn new(name: impl Into<String>, snippet: Option<String>) -> Self {
        Self {
            name: name.into(),
            snippet,
        }
    }
}

/// The ordered probe catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.is_file() {
            return Err(CatalogError::ManifestNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        info!(?path, entries = entries.len(), "catalog manifest loaded");
        Ok(Self { root, entries })
    }

    /// Build a catalog from entries already in memory.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve each entry's page and extract its snippet.
    pub fn probes(&self, extractor: &SnippetExtractor) -> Vec<Probe> {
        self.entries
            .iter()
            .map(|entry| {
                let snippet = extractor.extract_file(&self.root.join(&entry.file));
                if snippet.is_none() {
                    debug!(probe = %entry.interface_name, file = %entry.file, "no example found");
                }
                Probe::new(entry.interface_name.clone(), snippet)
            })
            .collect()
    }
}
