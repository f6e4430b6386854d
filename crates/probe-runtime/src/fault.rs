//! Probe faults and failure-reason normalization.

use thiserror::Error;

/// Longest failure reason stored in a result record.
pub const MAX_REASON_CHARS: usize = 200;

/// A failed probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFault {
    #[error("404 Not Found")]
    NotFound,

    #[error("Timeout")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("KeyError: {0}")]
    MissingField(String),

    #[error("TypeError: {0}")]
    TypeMismatch(String),

    #[error("probe panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Remote(String),
}

impl ProbeFault {
    /// Fault for a non-success HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        if status == 404 {
            ProbeFault::NotFound
        } else {
            ProbeFault::Http {
                status,
                message: message.into(),
            }
        }
    }

    /// Short, human-readable reason recorded for this fault.
    pub fn reason(&self) -> String {
        normalize_reason(&self.to_string())
    }

    /// Classify the last non-empty line of an interpreter's stderr.
    pub fn from_stderr(stderr: &str) -> Option<Self> {
        let line = stderr.lines().map(str::trim).rev().find(|l| !l.is_empty())?;
        let lower = line.to_ascii_lowercase();

        let fault = if line.contains("404") {
            ProbeFault::NotFound
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ProbeFault::Timeout
        } else if let Some(rest) = strip_exception(line, "KeyError") {
            ProbeFault::MissingField(rest.to_string())
        } else if let Some(rest) = strip_exception(line, "TypeError") {
            ProbeFault::TypeMismatch(rest.to_string())
        } else if line.contains("JSONDecodeError") || line.contains("Expecting value") {
            ProbeFault::Malformed(line.to_string())
        } else {
            ProbeFault::Remote(line.to_string())
        };
        Some(fault)
    }
}

/// `"KeyError: 'x'"` → `Some("'x'")` for `name = "KeyError"`.
fn strip_exception<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    Some(rest.strip_prefix(':').unwrap_or(rest).trim())
}

/// Map a raw failure message to its recorded form.
///
/// Not-found and timeout failures collapse to fixed labels; anything else
/// passes through, truncated to [`MAX_REASON_CHARS`] characters.
pub fn normalize_reason(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("404") {
        return "404 Not Found".to_string();
    }
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        return "Timeout".to_string();
    }
    if raw.chars().count() > MAX_REASON_CHARS {
        let mut truncated: String = raw.chars().take(MAX_REASON_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        raw.to_string()
    }
}
