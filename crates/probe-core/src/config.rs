//! probe.toml configuration parser.
//!
//! Every section and key is optional. Durations are written as strings
//! ("500ms", "5s", "2m", or a bare number of seconds).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extract::DEFAULT_EXAMPLE_MARKER;

type ConfigResult<T> = Result<T, ConfigError>;

/// Preamble prepended to every snippet run by the interpreter binder.
/// `{timeout}` is replaced with the network timeout in seconds.
pub const DEFAULT_PREAMBLE: &str = "import socket\n\
socket.setdefaulttimeout({timeout})\n\
import akshare as ak\n\
import pandas as pd\n";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub catalog: CatalogConfig,
    pub results: ResultsConfig,
    pub pool: PoolConfig,
    pub retry: RetryConfig,
    pub sandbox: SandboxConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub manifest: PathBuf,
    pub example_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Pause between initial submissions.
    pub submit_delay: String,
    /// Lower bound of the jittered pre-execution delay.
    pub pacing_min: String,
    /// Upper bound of the jittered pre-execution delay.
    pub pacing_max: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Constant delay before a failed probe is re-submitted.
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Bound on any single network operation inside a probe.
    pub network_timeout: String,
    /// Interpreter used to run snippets.
    pub program: String,
    pub args: Vec<String>,
    pub preamble: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Snapshot and progress interval.
    pub interval: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("apis/manifest.json"),
            example_marker: DEFAULT_EXAMPLE_MARKER.to_string(),
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("api_test_results.json"),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            submit_delay: "500ms".to_string(),
            pacing_min: "1s".to_string(),
            pacing_max: "5s".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: "60s".to_string(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            network_timeout: "30s".to_string(),
            program: "python3".to_string(),
            args: vec!["-c".to_string()],
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: "5s".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn submit_delay(&self) -> ConfigResult<Duration> {
        field_duration("pool.submit_delay", &self.submit_delay)
    }

    pub fn pacing_min(&self) -> ConfigResult<Duration> {
        field_duration("pool.pacing_min", &self.pacing_min)
    }

    pub fn pacing_max(&self) -> ConfigResult<Duration> {
        field_duration("pool.pacing_max", &self.pacing_max)
    }
}

impl RetryConfig {
    pub fn interval(&self) -> ConfigResult<Duration> {
        field_duration("retry.interval", &self.interval)
    }
}

impl SandboxConfig {
    pub fn network_timeout(&self) -> ConfigResult<Duration> {
        field_duration("sandbox.network_timeout", &self.network_timeout)
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> ConfigResult<Duration> {
        field_duration("monitor.interval", &self.interval)
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HarnessConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every duration parses and the numeric bounds are sane.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "pool.concurrency must be at least 1".to_string(),
            ));
        }
        self.pool.submit_delay()?;
        if self.pool.pacing_min()? > self.pool.pacing_max()? {
            return Err(ConfigError::Invalid(
                "pool.pacing_min must not exceed pool.pacing_max".to_string(),
            ));
        }
        self.retry.interval()?;
        self.sandbox.network_timeout()?;
        if self.monitor.interval()?.is_zero() {
            return Err(ConfigError::Invalid(
                "monitor.interval must be positive".to_string(),
            ));
        }
        if self.sandbox.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sandbox.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn field_duration(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "1m", "0.5s".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (number, millis_per_unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1.0)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000.0)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000.0)
    } else {
        (s, 1_000.0)
    };
    let value = number.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(value * millis_per_unit / 1_000.0).ok()
}
