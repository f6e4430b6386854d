//! Snippet extraction from probe documentation pages.
//!
//! A documentation page carries its runnable example as the first fenced
//! code block after the example marker line. Pages without a marker or
//! without a closed fence simply have no example.

use std::path::Path;

use regex::Regex;
use tracing::debug;

/// Marker line that introduces the example section in catalog pages.
pub const DEFAULT_EXAMPLE_MARKER: &str = "接口示例";

/// Compiled matcher for one example marker.
#[derive(Debug, Clone)]
pub struct SnippetExtractor {
    pattern: Regex,
}

impl SnippetExtractor {
    /// Build an extractor for the given marker text.
    pub fn new(marker: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?s){}.*?\r?\n```(?:python)?[ \t]*\r?\n(.*?)```",
            regex::escape(marker)
        ))?;
        Ok(Self { pattern })
    }

    /// Extract the example block from a page, if any.
    pub fn extract(&self, text: &str) -> Option<String> {
        let captures = self.pattern.captures(text)?;
        let body = captures.get(1)?.as_str();
        if body.trim().is_empty() {
            return None;
        }
        Some(body.to_string())
    }

    /// Read a page from disk and extract its example.
    ///
    /// Unreadable or missing pages yield `None`.
    pub fn extract_file(&self, path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(text) => self.extract(&text),
            Err(e) => {
                debug!(?path, error = %e, "catalog page unreadable");
                None
            }
        }
    }
}

/// Extract the example snippet following `marker` in `text`.
pub fn extract_example(text: &str, marker: &str) -> Option<String> {
    SnippetExtractor::new(marker).ok()?.extract(text)
}

/// Extract the example snippet from the page at `path`.
pub fn extract_example_file(path: &Path, marker: &str) -> Option<String> {
    SnippetExtractor::new(marker).ok()?.extract_file(path)
}
